//! # AlgoViz Engine - Motor de Execução e Captura de Passos
//!
//! Este é o **ponto de entrada** do motor que alimenta o ambiente de
//! prática de algoritmos no navegador: o usuário escreve código para
//! resolver um problema, o motor executa com segurança numa sandbox,
//! grava cada passo significativo (push, swap, partition, traverse...)
//! e reporta se a tentativa passou - mais o registro passo a passo que
//! a UI usa para animar a execução.
//!
//! ## O que este arquivo faz?
//!
//! 1. **Processa argumentos da linha de comando** (CLI) usando `clap`
//! 2. **Carrega** o desafio (ou catálogo) e a submissão do disco
//! 3. **Inicializa a telemetria** (OpenTelemetry) para observabilidade
//! 4. **Executa** a submissão contra cada desafio (sandbox + trace)
//! 5. **Gera um relatório** JSON com os resultados
//!
//! ## Exemplo de uso:
//!
//! ```bash
//! # Executar uma submissão contra um catálogo de desafios
//! algoviz-engine execute --challenge desafios.json --submission solucao.rhai
//!
//! # Só os desafios médios, com relatório em arquivo e OTEL
//! algoviz-engine execute -c desafios.json -s solucao.rhai \
//!     --difficulty medium --output resultado.json --otel
//!
//! # Pré-voo de uma submissão (sem executar)
//! algoviz-engine validate --submission solucao.rhai
//! ```
//!
//! ## Arquitetura do motor
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! │  (CLI, orquestração, relatórios)                             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!      ┌──────────┬────────────┼────────────┬──────────────┐
//!      ▼          ▼            ▼            ▼              ▼
//! ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌───────────┐
//! │patterns/│ │instru-  │ │ sandbox/ │ │collec-   │ │orchestra- │
//! │ (gate)  │ │ment/    │ │ (host)   │ │tions/    │ │tor/       │
//! └─────────┘ └─────────┘ └──────────┘ └──────────┘ └───────────┘
//! ```

// ============================================================================
// DECLARAÇÃO DE MÓDULOS
// ============================================================================

/// Shim de assertions injetado na sandbox (expect/toBe/toEqual/...).
mod assertions;

/// Coleções rastreadas: sete estruturas de dados instrumentadas.
mod collections;

/// Códigos de erro estruturados (E1xxx, E2xxx, etc.).
mod errors;

/// Instrumentador: valida sintaxe, injeta guards de loop, boundary.
mod instrument;

/// Limites de execução (timeout, loops, recursão, paralelismo).
mod limits;

/// Carregamento de desafios e submissões (JSON).
mod loader;

/// Orquestrador: entry point, bundles, gate, montagem, resultados.
mod orchestrator;

/// Validador de padrões algorítmicos (gate sintático).
mod patterns;

/// Pipeline de captura: instrumentar → executar → agregar.
mod pipeline;

/// Protocolo: envelopes host↔sandbox, TraceStep, TestResult.
mod protocol;

/// Host da sandbox: contexto isolado, timeout, canal validado.
mod sandbox;

/// Telemetria: integração OpenTelemetry.
mod telemetry;

// ============================================================================
// IMPORTS
// ============================================================================

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, Level};
use uuid::Uuid;

use limits::ExecutionLimits;
use orchestrator::{run_tests, run_tests_by_difficulty, validate_user_code, RunOptions};
use protocol::{Difficulty, ExecutionReport, ExecutionSummary};
use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TraceExport};

// ============================================================================
// DEFINIÇÃO DA CLI
// ============================================================================

/// Estrutura principal da CLI.
#[derive(Parser)]
#[command(name = "algoviz-engine")]
#[command(about = "AlgoViz Engine - execução sandboxed e captura de passos de algoritmos", long_about = None)]
struct Cli {
    /// Subcomando a ser executado.
    #[command(subcommand)]
    command: Commands,
}

/// Subcomandos disponíveis.
#[derive(Subcommand)]
enum Commands {
    /// Executa uma submissão contra um desafio ou catálogo.
    Execute {
        /// Caminho para o arquivo de desafio (objeto ou array JSON).
        #[arg(short, long)]
        challenge: PathBuf,

        /// Caminho para o arquivo da submissão.
        #[arg(short, long)]
        submission: PathBuf,

        /// Caminho para salvar o relatório de execução (opcional).
        /// Se não especificado, o relatório sai no console.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Filtra o catálogo por dificuldade (easy, medium, hard).
        #[arg(long)]
        difficulty: Option<Difficulty>,

        /// Override do timeout de parede por run, em milissegundos.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Habilita exportação de traces para OpenTelemetry.
        #[arg(long, default_value = "false")]
        otel: bool,

        /// Endpoint do collector OTEL (opcional).
        /// Se ausente, usa `OTEL_EXPORTER_OTLP_ENDPOINT` ou o padrão.
        #[arg(long)]
        otel_endpoint: Option<String>,

        /// Modo silencioso: apenas erros críticos no stderr.
        #[arg(long, short = 'q', default_value = "false")]
        silent: bool,

        /// Modo verbose: logs detalhados de debug.
        #[arg(long, short = 'v', default_value = "false")]
        verbose: bool,

        /// ID de execução customizado (UUID).
        /// Se não especificado, gera um v4 automaticamente.
        #[arg(long)]
        execution_id: Option<String>,
    },

    /// Pré-voo de uma submissão: não-vazia, tem função, delimitadores
    /// balanceados. Não executa nada.
    Validate {
        /// Caminho para o arquivo da submissão.
        #[arg(short, long)]
        submission: PathBuf,
    },
}

// ============================================================================
// FUNÇÃO PRINCIPAL
// ============================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Execute {
            challenge,
            submission,
            output,
            difficulty,
            timeout_ms,
            otel,
            otel_endpoint,
            silent,
            verbose,
            execution_id,
        } => {
            let exec_id = execution_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            setup_telemetry(*silent, *verbose, *otel, otel_endpoint);

            execute_challenges(
                challenge,
                submission,
                output,
                *difficulty,
                *timeout_ms,
                &exec_id,
                *silent,
            )
            .await;

            shutdown_telemetry();
        }

        Commands::Validate { submission } => {
            let source = match loader::load_submission_from_file(submission) {
                Ok(source) => source,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            };

            let validation = validate_user_code(&source);
            if validation.valid {
                println!("ok");
            } else {
                println!("{}", validation.error.unwrap_or_default());
                std::process::exit(1);
            }
        }
    }
}

// ============================================================================
// TELEMETRIA DA CLI
// ============================================================================

/// Endpoint OTLP usado quando `--otel` é passado sem endpoint nenhum
/// (nem na CLI, nem no ambiente).
const FALLBACK_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Resolve a telemetria a partir das flags da CLI.
///
/// As flags só sobrescrevem o que o ambiente não definiu: `--silent`/
/// `--verbose` escolhem o nível; `--otel` garante que a exportação
/// esteja ligada, usando (nesta ordem) o endpoint da CLI, o do
/// ambiente, ou o fallback local. Uma falha ao montar o exporter não
/// derruba a execução: o motor segue só com log de console.
fn setup_telemetry(silent: bool, verbose: bool, otel: bool, otel_endpoint: &Option<String>) {
    let level = match (silent, verbose) {
        (true, _) => Level::ERROR,
        (false, true) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    let mut config = TelemetryConfig::from_env().with_level(level);
    if otel {
        let endpoint = match (otel_endpoint, &config.export) {
            (Some(from_cli), _) => from_cli.clone(),
            (None, TraceExport::Otlp { endpoint }) => endpoint.clone(),
            (None, TraceExport::Disabled) => FALLBACK_OTLP_ENDPOINT.to_string(),
        };
        config = config.with_otlp_endpoint(endpoint);
    }

    if let Err(telemetry_error) = init_telemetry(config) {
        if !silent {
            eprintln!(
                "Aviso: telemetria indisponível ({}); seguindo com log básico",
                telemetry_error
            );
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

// ============================================================================
// EXECUÇÃO DOS DESAFIOS
// ============================================================================

/// Executa a submissão contra os desafios e gera o relatório.
///
/// ## Etapas:
/// 1. **Load**: desafio(s) + submissão do disco
/// 2. **Options**: limites do ambiente + override de timeout
/// 3. **Run**: cada desafio em sequência (sandbox nova por run)
/// 4. **Report**: resumo + resultados, em arquivo ou stdout
#[allow(clippy::too_many_arguments)]
async fn execute_challenges(
    challenge_path: &PathBuf,
    submission_path: &PathBuf,
    output_path: &Option<PathBuf>,
    difficulty: Option<Difficulty>,
    timeout_ms: Option<u64>,
    execution_id: &str,
    silent: bool,
) {
    if !silent {
        info!(execution_id = %execution_id, "Engine initializing");
    }
    let start_time = Utc::now();
    let started = std::time::Instant::now();

    // 1. Carrega desafios e submissão.
    let challenges = match loader::load_challenges_from_file(challenge_path) {
        Ok(c) => c,
        Err(e) => {
            // O variant do erro decide o código estruturado.
            let code = match &e {
                loader::LoadError::Unreadable { .. } => errors::ErrorCode::CHALLENGE_FILE_NOT_FOUND,
                loader::LoadError::InvalidJson { .. } | loader::LoadError::WrongShape { .. } => {
                    errors::ErrorCode::INVALID_CHALLENGE_FORMAT
                }
            };
            let structured = errors::StructuredError::new(code, e.to_string());
            error!(error = %structured, "Failed to load challenges");
            std::process::exit(1);
        }
    };
    let submission = match loader::load_submission_from_file(submission_path) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to load submission");
            std::process::exit(1);
        }
    };
    if !silent {
        info!(challenge_count = challenges.len(), "Challenges loaded");
    }

    // 2. Pré-voo da submissão: erros baratos antes de subir sandbox.
    let preflight = validate_user_code(&submission);
    if !preflight.valid {
        error!(error = %preflight.error.unwrap_or_default(), "Submission failed pre-flight validation");
        std::process::exit(1);
    }

    // 3. Limites: ambiente + override de timeout da CLI.
    let mut execution_limits = ExecutionLimits::from_env();
    if let Some(timeout_ms) = timeout_ms {
        execution_limits = execution_limits.with_timeout_ms(timeout_ms);
    }
    let options = RunOptions {
        limits: execution_limits,
        capture_steps: true,
        capture_logs: true,
    };

    // 4. Executa (sequencial; cada run tem sandbox própria).
    let results = match difficulty {
        Some(difficulty) => {
            run_tests_by_difficulty(&submission, &challenges, difficulty, &options).await
        }
        None => run_tests(&submission, &challenges, &options).await,
    };

    let all_passed = results.iter().all(|r| r.passed);
    let end_time = Utc::now();
    if !silent {
        info!(
            total = results.len(),
            passed = results.iter().filter(|r| r.passed).count(),
            "Execution finished"
        );
    }

    // 5. Gera e entrega o relatório.
    let duration_ms = started.elapsed().as_millis() as u64;
    let report = ExecutionReport {
        execution_id: execution_id.to_string(),
        status: if all_passed {
            "passed".to_string()
        } else {
            "failed".to_string()
        },
        start_time: start_time.to_rfc3339(),
        end_time: end_time.to_rfc3339(),
        summary: ExecutionSummary::from_results(&results, duration_ms),
        results,
    };

    if let Some(path) = output_path {
        let json = serde_json::to_string_pretty(&report).expect("Failed to serialize report");
        if let Err(e) = fs::write(path, json) {
            eprintln!("Failed to write report: {}", e);
        } else if !silent {
            println!("Report saved to: {:?}", path);
        }
    } else if !silent {
        let json = serde_json::to_string_pretty(&report).expect("Failed to serialize report");
        println!("\n--- Execution Report ---\n{}", json);
    }

    // Exit code baseado no resultado.
    if !all_passed {
        std::process::exit(1);
    }
}
