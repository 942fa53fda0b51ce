//! What an extension tells the orchestrator about itself.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::category::ExtensionCategory;

/// Connect-handshake response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub extension_type: String,
    pub secret: String,
    pub callback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<bool>,
}

impl ExtensionDescriptor {
    pub fn new(
        name: impl Into<String>,
        extension_type: impl Into<String>,
        secret: impl Into<String>,
        callback: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            extension_type: extension_type.into(),
            secret: secret.into(),
            callback: callback.into(),
            live: None,
        }
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = Some(live);
        self
    }

    /// Callback URL an extension advertises for itself.
    pub fn callback_for(hostname: &str, port: u16) -> String {
        format!("http://{}:{}/", hostname, port)
    }
}

/// Self-registration body: `{<category>: name, type, live?}`.
///
/// The field carrying the name is the category itself, which is why this
/// type serializes by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfRegistration {
    pub category: ExtensionCategory,
    pub name: String,
    pub extension_type: String,
    pub live: Option<bool>,
}

impl SelfRegistration {
    pub fn new(
        category: ExtensionCategory,
        name: impl Into<String>,
        extension_type: impl Into<String>,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            extension_type: extension_type.into(),
            live: None,
        }
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = Some(live);
        self
    }

    /// Path of the orchestrator endpoint, relative to its base URL.
    pub fn path(&self) -> String {
        format!("{}/", self.category)
    }
}

impl Serialize for SelfRegistration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.live.is_some() { 3 } else { 2 };
        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry(self.category.as_str(), &self.name)?;
        map.serialize_entry("type", &self.extension_type)?;
        if let Some(live) = self.live {
            map.serialize_entry("live", &live)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_self_registration_uses_category_as_key() {
        let registration = SelfRegistration::new(ExtensionCategory::Driver, "selenium", "web");
        assert_eq!(
            serde_json::to_value(&registration).unwrap(),
            json!({"driver": "selenium", "type": "web"})
        );
        assert_eq!(registration.path(), "driver/");

        let registration =
            SelfRegistration::new(ExtensionCategory::Reporter, "file", "reporter").with_live(false);
        assert_eq!(
            serde_json::to_value(&registration).unwrap(),
            json!({"reporter": "file", "type": "reporter", "live": false})
        );
    }

    #[test]
    fn test_descriptor_shape() {
        let descriptor = ExtensionDescriptor::new(
            "example",
            "example",
            "s3cret",
            ExtensionDescriptor::callback_for("localhost", 8888),
        );
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "name": "example",
                "type": "example",
                "secret": "s3cret",
                "callback": "http://localhost:8888/"
            })
        );

        let live = descriptor.with_live(true);
        assert_eq!(serde_json::to_value(&live).unwrap()["live"], true);
    }
}
