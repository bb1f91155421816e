//! # Módulo de Telemetria
//!
//! Observabilidade do motor via `tracing` + OpenTelemetry. Cada run de
//! teste vira um evento padronizado com campos `run.*` (desafio,
//! resultado, passos, duração), e os traces podem ser exportados via
//! OTLP para Jaeger/Tempo/Zipkin.
//!
//! ## Para todos entenderem:
//!
//! Quando uma submissão roda lenta ou falha em produção, queremos
//! responder três perguntas sem reproduzir nada localmente:
//! - Qual desafio estava rodando, e passou?
//! - Quantos passos o trace capturou?
//! - Quanto tempo a sandbox levou?
//!
//! Os campos `run.*` respondem isso direto no backend de traces.
//!
//! ## Configuração via variáveis de ambiente (padrão OTEL):
//!
//! - `OTEL_SERVICE_NAME`: Nome do serviço
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: URL do coletor OTLP (gRPC)
//! - `OTEL_TRACES_SAMPLER_ARG`: Taxa de sampling (0.0-1.0)
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! init_telemetry(TelemetryConfig::from_env())?;
//!
//! // ... runs de teste emitem eventos run.* ...
//!
//! shutdown_telemetry(); // flush dos spans em lote
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing::Level;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

// ============================================================================
// CONFIGURAÇÃO
// ============================================================================

/// Destino dos traces do motor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceExport {
    /// Sem exportação: spans e eventos só alimentam o log de console.
    Disabled,
    /// Exporta em lote via OTLP/gRPC para o endpoint dado.
    Otlp { endpoint: String },
}

/// Configuração do sistema de telemetria.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Nome do serviço nos traces (`service.name`).
    pub service_name: String,

    /// Para onde exportar os traces.
    pub export: TraceExport,

    /// Taxa de sampling (0.0 = nada, 1.0 = tudo).
    pub sampling_ratio: f64,

    /// Se o log formatado de console fica ligado.
    pub console_logging: bool,

    /// Nível mínimo de log quando `RUST_LOG` não está definido.
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "algoviz-engine".to_string(),
            export: TraceExport::Disabled,
            sampling_ratio: 1.0,
            console_logging: true,
            log_level: Level::INFO,
        }
    }
}

impl TelemetryConfig {
    /// Lê a configuração das variáveis de ambiente padrão do OTEL.
    /// O que não estiver definido fica nos defaults do motor.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.export = TraceExport::Otlp { endpoint };
        }
        if let Ok(raw) = std::env::var("OTEL_TRACES_SAMPLER_ARG") {
            if let Ok(ratio) = raw.parse::<f64>() {
                config.sampling_ratio = ratio.clamp(0.0, 1.0);
            }
        }

        config
    }

    /// Troca o nível mínimo de log.
    pub fn with_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Liga a exportação OTLP para o endpoint dado.
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.export = TraceExport::Otlp {
            endpoint: endpoint.into(),
        };
        self
    }

    /// Sampler derivado da taxa configurada. No meio-termo, a decisão
    /// é por trace ID, então os eventos de uma mesma run ficam juntos.
    fn sampler(&self) -> Sampler {
        if self.sampling_ratio >= 1.0 {
            Sampler::AlwaysOn
        } else if self.sampling_ratio <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::TraceIdRatioBased(self.sampling_ratio)
        }
    }

    /// Resource do motor: além do `service.name`, marca a versão do
    /// crate e o runtime da sandbox, para filtrar traces por versão do
    /// motor no backend.
    fn resource(&self) -> Resource {
        Resource::new([
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            KeyValue::new("engine.sandbox", "rhai"),
            KeyValue::new("engine.component", "step-capture"),
        ])
    }
}

// ============================================================================
// INICIALIZAÇÃO E ENCERRAMENTO
// ============================================================================

/// Inicializa logging e (opcionalmente) a exportação de traces.
///
/// `RUST_LOG` tem precedência sobre o nível configurado. Retorna o
/// tracer OTLP quando a exportação está ligada, para quem quiser criar
/// spans manuais.
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<Option<Tracer>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);

    match config.export.clone() {
        TraceExport::Otlp { endpoint } => {
            let tracer = build_otlp_tracer(&config, &endpoint)?;
            let with_otlp = registry.with(OpenTelemetryLayer::new(tracer.clone()));
            if config.console_logging {
                with_otlp
                    .with(tracing_subscriber::fmt::layer().compact())
                    .init();
            } else {
                with_otlp.init();
            }

            tracing::info!(
                service = %config.service_name,
                endpoint = %endpoint,
                sampling = config.sampling_ratio,
                "Exportação OTLP de traces ativa"
            );
            Ok(Some(tracer))
        }
        TraceExport::Disabled => {
            if config.console_logging {
                registry
                    .with(tracing_subscriber::fmt::layer().compact())
                    .init();
            } else {
                registry.init();
            }

            tracing::info!("Telemetria em modo console (sem exportação de traces)");
            Ok(None)
        }
    }
}

/// Monta o tracer OTLP: exporter gRPC em lote no runtime Tokio, com o
/// sampler e o resource do motor.
fn build_otlp_tracer(config: &TelemetryConfig, endpoint: &str) -> anyhow::Result<Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            sdktrace::Config::default()
                .with_sampler(config.sampler())
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(config.resource()),
        )
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);
    Ok(tracer)
}

/// Encerra a telemetria. O exporter acumula spans em lote; sem este
/// flush, o final da última execução se perde.
pub fn shutdown_telemetry() {
    tracing::debug!("Enviando spans pendentes antes de encerrar");
    global::shutdown_tracer_provider();
}

// ============================================================================
// SPAN LÓGICO DE UMA RUN
// ============================================================================

/// Campos padronizados por run de teste.
pub mod spans {
    use std::time::Instant;
    use tracing::info;

    /// Span lógico de uma run: marca o início no orquestrador e, ao
    /// concluir, emite um único evento com os campos `run.*` que o
    /// backend de traces indexa.
    #[derive(Debug)]
    pub struct RunSpan {
        challenge_id: String,
        started: Instant,
    }

    impl RunSpan {
        /// Abre o span lógico da run de um desafio.
        pub fn begin(challenge_id: &str) -> Self {
            Self {
                challenge_id: challenge_id.to_string(),
                started: Instant::now(),
            }
        }

        /// Conclui a run: emite o evento `run.*` e devolve a duração
        /// medida, em milissegundos.
        pub fn complete(self, passed: bool, step_count: usize, error_code: Option<&str>) -> u64 {
            let duration_ms = self.started.elapsed().as_millis() as u64;
            info!(
                run.challenge_id = %self.challenge_id,
                run.passed = passed,
                run.step_count = step_count,
                run.duration_ms = duration_ms,
                run.error_code = error_code.unwrap_or("-"),
                "Run de teste concluída"
            );
            duration_ms
        }
    }
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "algoviz-engine");
        assert_eq!(config.export, TraceExport::Disabled);
        assert_eq!(config.sampling_ratio, 1.0);
        assert!(config.console_logging);
    }

    #[test]
    fn test_builder_helpers() {
        let config = TelemetryConfig::default()
            .with_level(Level::DEBUG)
            .with_otlp_endpoint("http://collector:4317");

        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(
            config.export,
            TraceExport::Otlp {
                endpoint: "http://collector:4317".to_string()
            }
        );
    }

    #[test]
    fn test_run_span_measures_duration() {
        let span = spans::RunSpan::begin("array-sort-easy");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let duration = span.complete(true, 12, None);
        assert!(duration >= 5);
    }

    #[test]
    fn test_run_span_with_error_code() {
        // Sem subscriber instalado o evento é descartado; só o
        // contrato de duração importa aqui.
        let span = spans::RunSpan::begin("linkedlist-cycle-hard");
        let duration = span.complete(false, 0, Some("E2002"));
        assert!(duration < 1_000);
    }
}
