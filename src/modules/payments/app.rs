use std::net::{SocketAddr, TcpListener};

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};
use tokio::task::JoinHandle;
use tracing_actix_web::TracingLogger;

use super::controllers;
use super::repositories::TransactionRepository;
use super::services::{ChargeClient, PaymentService};
use crate::config::connect_any;
use crate::core::{HarnessError, Result};

/// The payments API running on an ephemeral local port
pub struct PaymentApp {
    address: SocketAddr,
    server: ServerHandle,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl PaymentApp {
    /// Start the app against `database_url`, charging through `processor_url`
    pub async fn start(database_url: &str, processor_url: &str) -> Result<Self> {
        let pool = connect_any(database_url).await?;
        let service = web::Data::new(PaymentService::new(
            TransactionRepository::new(pool),
            ChargeClient::new(processor_url),
        ));

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let address = listener.local_addr()?;

        let server = HttpServer::new(move || {
            App::new()
                .app_data(service.clone())
                .wrap(TracingLogger::default())
                .configure(controllers::configure)
        })
        .workers(1)
        .disable_signals()
        .listen(listener)?
        .run();

        let handle = server.handle();
        let task = tokio::spawn(server);
        tracing::debug!(address = %address, "Payments app started");

        Ok(Self {
            address,
            server: handle,
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub async fn stop(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        self.server.stop(true).await;
        task.await
            .map_err(|e| HarnessError::Internal(format!("Payments app task failed: {}", e)))??;
        Ok(())
    }
}

impl Drop for PaymentApp {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.server.stop(false);
        }
    }
}
