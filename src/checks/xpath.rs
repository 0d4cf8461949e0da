//! XPath expressions evaluated against XML fetched over HTTP.

use sxd_document::parser;
use sxd_xpath::Context;
use sxd_xpath::Factory;
use sxd_xpath::Value;
use tracing::debug;

use super::Configurable;
use super::http::Endpoint;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::Host;

/// Whether `expression` yields a truthy value on the document in `xml`.
///
/// Node sets are true when non-empty, numbers when non-zero and strings when
/// non-empty.
pub fn evaluate(expression: &str, xml: &str) -> Result<bool, String> {
    let package = parser::parse(xml).map_err(|e| format!("Invalid XML: {e:?}"))?;
    let document = package.as_document();

    let xpath = Factory::new()
        .build(expression)
        .map_err(|e| format!("Invalid XPath expression {expression}: {e:?}"))?
        .ok_or_else(|| format!("Empty XPath expression {expression:?}"))?;

    let value = xpath
        .evaluate(&Context::new(), document.root())
        .map_err(|e| format!("Cannot evaluate {expression}: {e:?}"))?;

    Ok(match value {
        Value::Boolean(b) => b,
        Value::Number(n) => n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        Value::Nodeset(nodes) => nodes.size() > 0,
    })
}

/// Active while the XPath expression matches the document at `url`.
#[derive(Debug)]
pub struct XPath {
    expression: String,
    endpoint: Endpoint,
}

impl XPath {
    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let body = self.endpoint.get_bytes().await?;
        let xml = String::from_utf8(body)
            .map_err(|e| CheckError::temporary(format!("Reply is not UTF-8: {e}")))?;

        let matched = evaluate(&self.expression, &xml).map_err(CheckError::temporary)?;
        debug!("XPath {} matched: {}", self.expression, matched);

        if matched {
            Ok(Evaluation::active(format!(
                "XPath matches for url {}",
                self.endpoint.url()
            )))
        } else {
            Ok(Evaluation::Inactive)
        }
    }
}

impl Configurable for XPath {
    fn create(section: &CheckSection, _host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["url", "xpath", "timeout"])?;

        let expression = section.required_string("xpath")?;
        evaluate(&expression, "<a></a>").map_err(|reason| ConfigurationError::invalid("xpath", reason))?;

        Ok(Self {
            expression,
            endpoint: Endpoint::from_section(section, None)?,
        })
    }
}
