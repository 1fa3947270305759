//! OGC ServiceExceptionReport documents.

use wfs_common::WfsError;

use crate::xml::escape;

/// Build a ServiceExceptionReport with a single exception.
pub fn service_exception(code: &str, locator: Option<&str>, message: &str) -> String {
    let locator = locator
        .map(|l| format!(r#" locator="{}""#, escape(l)))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ServiceExceptionReport version="1.2.0"
    xmlns="http://www.opengis.net/ogc"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xsi:schemaLocation="http://www.opengis.net/ogc http://schemas.opengis.net/wfs/1.0.0/OGC-exception.xsd">
  <ServiceException code="{}"{}>{}</ServiceException>
</ServiceExceptionReport>
"#,
        code,
        locator,
        escape(message)
    )
}

/// Report for a [`WfsError`], using its exception code and locator.
pub fn exception_report(err: &WfsError) -> String {
    service_exception(err.wfs_exception_code(), err.locator(), &err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    #[test]
    fn test_exception_report() {
        let err = WfsError::UnsupportedVersion("2.0.0".to_string());
        let root = xml::parse(&exception_report(&err)).unwrap();
        assert_eq!(root.name, "ServiceExceptionReport");
        let exception = root.child("ServiceException").unwrap();
        assert_eq!(exception.attr("code"), Some("VersionNegotiationFailed"));
        assert_eq!(exception.attr("locator"), Some("VERSION"));
        assert!(exception.text().contains("2.0.0"));
    }

    #[test]
    fn test_message_is_escaped() {
        let doc = service_exception("NoApplicableCode", None, "a < b & c");
        assert!(doc.contains("a &lt; b &amp; c"));
        assert!(!doc.contains("locator="));
    }
}
