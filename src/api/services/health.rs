use poem_openapi::payload::PlainText;

use crate::config::ServerConnection;

pub struct HealthService<'a> {
    pub servers: &'a [ServerConnection],
}

impl<'a> HealthService<'a> {
    pub fn new(servers: &'a [ServerConnection]) -> Self {
        Self { servers }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn status_text(&self) -> PlainText<String> {
        PlainText(format!(
            "{} version={} servers={}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.servers.len()
        ))
    }
}
