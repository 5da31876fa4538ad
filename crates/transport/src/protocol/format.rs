//! How a response body is interpreted.
//!
//! A [`ResponseFormat`] decides which status codes count as success and turns the
//! body into the value exposed through `Response::object`. Three formats ship with
//! the crate: [`TextFormat`], [`JsonFormat`] and [`XmlFormat`].

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::xml::XmlElement;
use crate::protocol::{ParseError, Response};

/// Settings shared by every format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    success_codes: Vec<StatusCode>,
    parse_zero_length_body: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { success_codes: vec![StatusCode::OK, StatusCode::CREATED], parse_zero_length_body: false }
    }
}

impl FormatOptions {
    /// Replaces the success set, `200` and `201` by default.
    #[must_use]
    pub fn with_success_codes<I: IntoIterator<Item = StatusCode>>(mut self, codes: I) -> Self {
        self.success_codes = codes.into_iter().collect();
        self
    }

    /// When enabled an empty body is still handed to the parser.
    #[must_use]
    pub fn with_parse_zero_length_body(mut self, parse: bool) -> Self {
        self.parse_zero_length_body = parse;
        self
    }

    pub fn success_codes(&self) -> &[StatusCode] {
        &self.success_codes
    }
}

pub trait ResponseFormat: Send + Sync {
    type Output: Send;

    fn options(&self) -> &FormatOptions;

    fn success(&self, status: StatusCode) -> bool {
        self.options().success_codes.contains(&status)
    }

    fn parse_zero_length_body(&self) -> bool {
        self.options().parse_zero_length_body
    }

    /// Value used for an empty body that is not parsed.
    fn empty_body(&self) -> Self::Output;

    fn parse_body(&self, body: &str, driver: Option<&str>) -> Result<Self::Output, ParseError>;

    /// Message carried by `HttpError::Status` for a failed call.
    fn parse_error(&self, body: &str, driver: Option<&str>) -> Result<String, ParseError> {
        let _ = driver;
        Ok(body.to_string())
    }
}

/// Body as text.
#[derive(Debug, Clone, Default)]
pub struct TextFormat {
    options: FormatOptions,
}

impl TextFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FormatOptions) -> Self {
        Self { options }
    }
}

impl ResponseFormat for TextFormat {
    type Output = String;

    fn options(&self) -> &FormatOptions {
        &self.options
    }

    fn empty_body(&self) -> Self::Output {
        String::new()
    }

    fn parse_body(&self, body: &str, _driver: Option<&str>) -> Result<Self::Output, ParseError> {
        Ok(body.to_string())
    }
}

/// Body as a [`serde_json::Value`], `Value::Null` for an empty body.
#[derive(Debug, Clone, Default)]
pub struct JsonFormat {
    options: FormatOptions,
}

impl JsonFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FormatOptions) -> Self {
        Self { options }
    }
}

impl ResponseFormat for JsonFormat {
    type Output = Value;

    fn options(&self) -> &FormatOptions {
        &self.options
    }

    fn empty_body(&self) -> Self::Output {
        Value::Null
    }

    fn parse_body(&self, body: &str, driver: Option<&str>) -> Result<Self::Output, ParseError> {
        serde_json::from_str(body).map_err(|e| ParseError::malformed(format!("Failed to parse JSON: {e}"), body, driver))
    }

    fn parse_error(&self, body: &str, driver: Option<&str>) -> Result<String, ParseError> {
        Ok(match self.parse_body(body, driver)? {
            Value::String(message) => message,
            value => value.to_string(),
        })
    }
}

impl Response<Value> {
    /// Deserializes the parsed JSON body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        T::deserialize(self.object()).map_err(|e| ParseError::malformed(format!("unexpected JSON shape: {e}"), self.text(), None))
    }
}

/// Body as an owned [`XmlElement`] tree, `None` for an empty body.
#[derive(Debug, Clone, Default)]
pub struct XmlFormat {
    options: FormatOptions,
}

impl XmlFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FormatOptions) -> Self {
        Self { options }
    }
}

impl ResponseFormat for XmlFormat {
    type Output = Option<XmlElement>;

    fn options(&self) -> &FormatOptions {
        &self.options
    }

    fn empty_body(&self) -> Self::Output {
        None
    }

    fn parse_body(&self, body: &str, driver: Option<&str>) -> Result<Self::Output, ParseError> {
        XmlElement::parse(body).map(Some).map_err(|reason| ParseError::malformed(format!("Failed to parse XML: {reason}"), body, driver))
    }

    fn parse_error(&self, body: &str, driver: Option<&str>) -> Result<String, ParseError> {
        self.parse_body(body, driver)?;
        Ok(body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn default_success_set() {
        let format = TextFormat::new();
        assert!(format.success(StatusCode::OK));
        assert!(format.success(StatusCode::CREATED));
        assert!(!format.success(StatusCode::ACCEPTED));
        assert!(!format.success(StatusCode::NO_CONTENT));
        assert!(!format.success(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn malformed_json_names_driver() {
        let err = JsonFormat::new().parse_body("{not json", Some("CloudFiles")).unwrap_err();
        let ParseError::Malformed { reason, body, driver } = err else { panic!("expect malformed") };
        assert!(reason.starts_with("Failed to parse JSON"));
        assert_eq!(body, "{not json");
        assert_eq!(driver.as_deref(), Some("CloudFiles"));
    }

    #[test]
    fn json_error_message() {
        let format = JsonFormat::new();
        assert_eq!(format.parse_error(r#""quota exceeded""#, None).unwrap(), "quota exceeded");
        assert_eq!(format.parse_error(r#"{"code":413}"#, None).unwrap(), r#"{"code":413}"#);
        assert!(format.parse_error("<html>", None).is_err());
    }

    #[test]
    fn xml_body() {
        let body = indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <ListBucketResult>
              <Name>photos</Name>
              <Contents><Key>a.jpg</Key><Size>12</Size></Contents>
              <Contents><Key>b.jpg</Key><Size>7</Size></Contents>
            </ListBucketResult>
        "#};
        let root = XmlFormat::new().parse_body(body, None).unwrap().unwrap();
        assert_eq!(root.name(), "ListBucketResult");
        assert_eq!(root.find_text("Name"), Some("photos"));
        assert_eq!(root.find_all("Contents").count(), 2);
    }

    #[test]
    fn malformed_xml() {
        let err = XmlFormat::new().parse_error("<Error><Code>NoSuchKey</Error>", Some("S3")).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { .. }));
    }

    #[test]
    fn typed_json() {
        #[derive(serde::Deserialize)]
        struct Account {
            containers: u32,
        }

        let head = crate::protocol::ResponseHead::new(StatusCode::OK, "OK".into(), http::Version::HTTP_11, http::HeaderMap::new());
        let response = Response::from_parts(&JsonFormat::new(), head, bytes::Bytes::from_static(br#"{"containers": 3}"#), None).unwrap();
        let account: Account = response.json().unwrap();
        assert_eq!(account.containers, 3);
    }
}
