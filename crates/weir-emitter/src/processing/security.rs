use std::collections::BTreeSet;

use weir_asyncapi::{AsyncApiDocument, SecuritySchemeObject};

use super::StageReport;
use crate::config::SecuritySchemeKey;
use crate::discovery::{SecurityConfig, SecurityScheme};
use crate::error::{codes, EmitError, EmitWarning};

/// Build a security scheme object from a discovered config.
///
/// Unrecognized types produce an `apiKey` scheme reading `Authorization`
/// from a header, plus a warning.
pub fn synthesize_scheme(
    config: &SecurityConfig,
) -> Result<(SecuritySchemeObject, Option<EmitWarning>), EmitError> {
    let mut warning = None;
    let mut scheme = match &config.scheme {
        SecurityScheme::OAuth2 { flows } => {
            let mut scheme = SecuritySchemeObject::of_type("oauth2");
            scheme.flows = flows.clone();
            scheme.scopes = config.scopes.clone();
            scheme
        }
        SecurityScheme::ApiKey { name, location } => {
            let mut scheme = SecuritySchemeObject::of_type("apiKey");
            scheme.name = Some(name.clone().unwrap_or_else(|| "Authorization".to_string()));
            scheme.location = Some(location.clone().unwrap_or_else(|| "header".to_string()));
            scheme
        }
        SecurityScheme::Http {
            scheme: http_scheme,
            bearer_format,
        } => {
            let mut scheme = SecuritySchemeObject::of_type("http");
            scheme.scheme = Some(http_scheme.clone().unwrap_or_else(|| "bearer".to_string()));
            scheme.bearer_format = bearer_format.clone();
            scheme
        }
        SecurityScheme::OpenIdConnect { url } => {
            let mut scheme = SecuritySchemeObject::of_type("openIdConnect");
            scheme.open_id_connect_url = Some(url.clone());
            scheme.scopes = config.scopes.clone();
            scheme
        }
        SecurityScheme::Sasl { mechanism } => {
            let scheme_type = match mechanism
                .to_ascii_lowercase()
                .replace(['-', '_'], "")
                .as_str()
            {
                "scramsha512" => "scramSha512",
                "scramsha256" => "scramSha256",
                "plain" => "plain",
                "gssapi" => "gssapi",
                _ => {
                    return Err(EmitError::configuration(
                        codes::SASL_MECHANISM_UNSUPPORTED,
                        format!("unsupported SASL mechanism '{}'", mechanism),
                    ))
                }
            };
            SecuritySchemeObject::of_type(scheme_type)
        }
        SecurityScheme::X509 => SecuritySchemeObject::of_type("X509"),
        SecurityScheme::SymmetricEncryption => SecuritySchemeObject::of_type("symmetricEncryption"),
        SecurityScheme::AsymmetricEncryption => {
            SecuritySchemeObject::of_type("asymmetricEncryption")
        }
        SecurityScheme::Unrecognized { scheme_type } => {
            tracing::warn!(
                security = %config.name,
                scheme_type = %scheme_type,
                "unrecognized security scheme type, falling back to apiKey header"
            );
            warning = Some(EmitWarning::new(
                codes::SECURITY_FALLBACK,
                format!(
                    "unrecognized security scheme type '{}', using apiKey 'Authorization' in header",
                    scheme_type
                ),
                Some(config.id.clone()),
            ));
            let mut scheme = SecuritySchemeObject::of_type("apiKey");
            scheme.name = Some("Authorization".to_string());
            scheme.location = Some("header".to_string());
            scheme
        }
    };
    scheme.description = config.description.clone();
    Ok((scheme, warning))
}

/// Turns security configs into `components.securitySchemes` entries.
pub struct SecurityProcessingService {
    key: SecuritySchemeKey,
}

impl SecurityProcessingService {
    pub fn new(key: SecuritySchemeKey) -> Self {
        Self { key }
    }

    fn scheme_key(&self, config: &SecurityConfig) -> String {
        match self.key {
            SecuritySchemeKey::Type => config.scheme.scheme_type().to_string(),
            SecuritySchemeKey::Name => config.name.clone(),
        }
    }

    pub fn process(&self, configs: &[SecurityConfig], doc: &mut AsyncApiDocument) -> StageReport {
        let mut report = StageReport::new("security");
        let mut written = BTreeSet::new();

        for config in configs {
            match synthesize_scheme(config) {
                Ok((scheme, warning)) => {
                    if let Some(warning) = warning {
                        report.warn(warning);
                    }
                    let key = self.scheme_key(config);
                    if !written.insert(key.clone()) {
                        report.warn(EmitWarning::new(
                            codes::SECURITY_KEY_COLLISION,
                            format!(
                                "security scheme '{}' overwrites an earlier scheme with the same key",
                                key
                            ),
                            Some(config.id.clone()),
                        ));
                    }
                    doc.components.security_schemes.insert(key, scheme);
                    report.processed += 1;
                }
                Err(err) => report.fail(&config.id, err),
            }
        }
        report.finish()
    }
}
