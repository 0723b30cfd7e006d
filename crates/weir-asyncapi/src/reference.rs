use serde::{Deserialize, Serialize};

/// A JSON Reference object (`{"$ref": "#/..."}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub reference: String,
}

impl Reference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// `#/channels/<key>`
    pub fn channel(key: &str) -> Self {
        Self::new(format!("#/channels/{}", escape_pointer_segment(key)))
    }

    /// `#/channels/<channel>/messages/<message>`
    pub fn channel_message(channel: &str, message: &str) -> Self {
        Self::new(format!(
            "#/channels/{}/messages/{}",
            escape_pointer_segment(channel),
            escape_pointer_segment(message)
        ))
    }

    /// `#/components/messages/<key>`
    pub fn component_message(key: &str) -> Self {
        Self::new(format!(
            "#/components/messages/{}",
            escape_pointer_segment(key)
        ))
    }

    /// `#/components/schemas/<key>`
    pub fn schema(key: &str) -> Self {
        Self::new(format!("#/components/schemas/{}", escape_pointer_segment(key)))
    }

    /// `#/components/securitySchemes/<key>`
    pub fn security_scheme(key: &str) -> Self {
        Self::new(format!(
            "#/components/securitySchemes/{}",
            escape_pointer_segment(key)
        ))
    }

    /// Whether this points inside the current document.
    pub fn is_local(&self) -> bool {
        self.reference.starts_with("#/")
    }

    /// The unescaped pointer segments of a local reference.
    pub fn segments(&self) -> Option<Vec<String>> {
        let path = self.reference.strip_prefix("#/")?;
        Some(path.split('/').map(unescape_pointer_segment).collect())
    }
}

/// Escape a key for use as a JSON Pointer segment (RFC 6901).
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverse [`escape_pointer_segment`].
pub fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_channel_reference() {
        let r = Reference::channel("publishuserevent");
        assert_eq!(r.reference, "#/channels/publishuserevent");
        assert!(r.is_local());
    }

    #[test]
    fn escapes_slashes_in_keys() {
        let r = Reference::channel("user/events");
        assert_eq!(r.reference, "#/channels/user~1events");
        assert_eq!(
            r.segments().unwrap(),
            vec!["channels".to_string(), "user/events".to_string()]
        );
    }

    #[test]
    fn external_reference_has_no_segments() {
        let r = Reference::new("common.yaml#/components/schemas/User");
        assert!(!r.is_local());
        assert!(r.segments().is_none());
    }

    #[test]
    fn serializes_as_dollar_ref() {
        let json = serde_json::to_value(Reference::component_message("UserEvent")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"$ref": "#/components/messages/UserEvent"})
        );
    }
}
