use futures_util::future::join_all;

use weir_asyncapi::{AsyncApiDocument, Bindings};
use weir_bindings::{BindingRequest, PluginRegistry, ServerContext};

use super::{request_binding, StageReport};
use crate::builder::ServerDeclaration;
use crate::error::{EmitError, EmitWarning};

/// Applies plugin-generated bindings to servers created by the builder.
pub struct ServerBindingService<'a> {
    registry: &'a PluginRegistry,
}

impl<'a> ServerBindingService<'a> {
    pub fn new(registry: &'a PluginRegistry) -> Self {
        Self { registry }
    }

    pub async fn process(
        &self,
        servers: &[ServerDeclaration],
        doc: &mut AsyncApiDocument,
    ) -> StageReport {
        let prepared = join_all(servers.iter().map(|decl| self.prepare(decl))).await;

        let mut report = StageReport::new("servers");
        for (decl, (warnings, result)) in servers.iter().zip(prepared) {
            for warning in warnings {
                report.warn(warning);
            }
            match result {
                Ok(bindings) => {
                    if let Some(server) = doc.servers.get_mut(&decl.name) {
                        server.bindings.extend(bindings);
                    }
                    report.processed += 1;
                }
                Err(err) => report.fail(&decl.name, err),
            }
        }
        report.finish()
    }

    async fn prepare(&self, decl: &ServerDeclaration) -> (Vec<EmitWarning>, Result<Bindings, EmitError>) {
        let mut warnings = Vec::new();
        let ctx = ServerContext {
            name: decl.name.clone(),
            host: decl.host.clone(),
            protocol: decl.protocol.clone(),
            config: decl.bindings.get(&decl.protocol).cloned(),
        };
        let result = request_binding(
            self.registry,
            &decl.protocol,
            BindingRequest::Server(&ctx),
            &mut warnings,
        )
        .await
        .map(|result| result.map(|r| r.binding_values()).unwrap_or_default());
        (warnings, result)
    }
}
