//! # Módulo de Limites de Execução
//!
//! Define as políticas de limite que protegem o host contra submissões
//! malformadas ou maliciosas (loops infinitos, recursão sem fim, fontes
//! gigantes).
//!
//! ## Para todos entenderem:
//!
//! O usuário escreve código livremente no editor. Antes e durante a
//! execução, o motor impõe regras:
//! - Máximo de iterações por loop (evita loop infinito)
//! - Máximo de profundidade de recursão (evita estouro de pilha)
//! - Timeout de relógio de parede (evita travar o host)
//! - Máximo de sandboxes em paralelo (evita sobrecarga)
//!
//! ## Limites configuráveis:
//!
//! | Limite               | Padrão  | Descrição                          |
//! |----------------------|---------|------------------------------------|
//! | timeout              | 5000 ms | Timeout de parede por execução     |
//! | max_loop_iterations  | 100000  | Iterações por loop instrumentado   |
//! | max_recursion_depth  | 1000    | Profundidade de chamadas no script |
//! | max_parallel_runs    | 10      | Sandboxes simultâneas em batch     |
//! | max_source_bytes     | 256 KiB | Tamanho máximo da submissão        |

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// LIMITES PADRÃO (CONSTANTES)
// ============================================================================

/// Timeout de relógio de parede por execução, em milissegundos.
/// Depois disso o host cancela a run e derruba a sandbox.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Número máximo de iterações permitidas em cada loop instrumentado.
/// Excedido, a sandbox lança "Infinite loop detected".
pub const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 100_000;

/// Profundidade máxima de chamadas de função dentro do script.
/// Excedido, a sandbox lança "Maximum recursion depth exceeded".
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1_000;

/// Número máximo de sandboxes executando em paralelo no modo batch.
pub const DEFAULT_MAX_PARALLEL_RUNS: usize = 10;

/// Tamanho máximo aceito para uma submissão, em bytes.
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 256 * 1024;

// ============================================================================
// ESTRUTURA DE LIMITES
// ============================================================================

/// Configuração de limites de execução.
///
/// Pode vir do desafio (override por run), de variáveis de ambiente,
/// ou dos padrões. Todos os campos têm valores padrão seguros.
///
/// ## Exemplo de uso:
///
/// ```rust
/// let limits = ExecutionLimits::default();
/// // Ou personalizado:
/// let limits = ExecutionLimits {
///     max_loop_iterations: 1_000,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Timeout de parede por execução.
    /// O host cancela a run e descarta mensagens atrasadas.
    pub timeout: Duration,

    /// Iterações máximas por loop instrumentado.
    /// Cada loop tem o próprio contador.
    pub max_loop_iterations: u64,

    /// Profundidade máxima de chamadas no script.
    pub max_recursion_depth: usize,

    /// Paralelismo máximo do executor batch.
    pub max_parallel_runs: usize,

    /// Tamanho máximo da submissão em bytes.
    /// Excedido, a run é rejeitada antes de instrumentar.
    pub max_source_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_parallel_runs: DEFAULT_MAX_PARALLEL_RUNS,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
        }
    }
}

impl ExecutionLimits {
    /// Cria limites a partir de variáveis de ambiente.
    ///
    /// Variáveis suportadas:
    /// - `ENGINE_TIMEOUT_MS`: Timeout por execução (ms)
    /// - `ENGINE_MAX_LOOP_ITERATIONS`: Iterações por loop
    /// - `ENGINE_MAX_RECURSION_DEPTH`: Profundidade de recursão
    /// - `ENGINE_MAX_PARALLEL_RUNS`: Paralelismo do batch
    /// - `ENGINE_MAX_SOURCE_BYTES`: Tamanho máximo da submissão
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        if let Ok(val) = std::env::var("ENGINE_TIMEOUT_MS") {
            if let Ok(n) = val.parse() {
                limits.timeout = Duration::from_millis(n);
            }
        }

        if let Ok(val) = std::env::var("ENGINE_MAX_LOOP_ITERATIONS") {
            if let Ok(n) = val.parse() {
                limits.max_loop_iterations = n;
            }
        }

        if let Ok(val) = std::env::var("ENGINE_MAX_RECURSION_DEPTH") {
            if let Ok(n) = val.parse() {
                limits.max_recursion_depth = n;
            }
        }

        if let Ok(val) = std::env::var("ENGINE_MAX_PARALLEL_RUNS") {
            if let Ok(n) = val.parse() {
                limits.max_parallel_runs = n;
            }
        }

        if let Ok(val) = std::env::var("ENGINE_MAX_SOURCE_BYTES") {
            if let Ok(n) = val.parse() {
                limits.max_source_bytes = n;
            }
        }

        limits
    }

    /// Limites restritivos para testes.
    pub fn strict() -> Self {
        Self {
            timeout: Duration::from_millis(1_000),
            max_loop_iterations: 10_000,
            max_recursion_depth: 100,
            max_parallel_runs: 2,
            max_source_bytes: 16 * 1024,
        }
    }

    /// Limites permissivos para desenvolvimento.
    pub fn relaxed() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_loop_iterations: 10_000_000,
            max_recursion_depth: 5_000,
            max_parallel_runs: 50,
            max_source_bytes: 4 * 1024 * 1024,
        }
    }

    /// Aplica um timeout customizado (override por run).
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }
}

// ============================================================================
// VALIDAÇÃO DE LIMITES
// ============================================================================

/// Resultado da validação pré-execução de limites.
#[derive(Debug)]
pub struct LimitValidationResult {
    pub passed: bool,
    pub violations: Vec<LimitViolation>,
}

/// Violação de limite detectada.
#[derive(Debug, Clone)]
pub struct LimitViolation {
    /// Nome do limite violado.
    pub limit_name: String,
    /// Valor máximo permitido.
    pub limit_value: String,
    /// Valor encontrado.
    pub actual_value: String,
    /// Mensagem descritiva.
    pub message: String,
}

/// Valida uma submissão contra os limites antes de instrumentar.
///
/// ## Parâmetros:
/// - `source_bytes`: Tamanho da submissão em bytes
/// - `limits`: Configuração de limites
///
/// ## Retorno:
/// `LimitValidationResult` com a lista de violações (se houver)
pub fn validate_limits(source_bytes: usize, limits: &ExecutionLimits) -> LimitValidationResult {
    let mut violations = Vec::new();

    if source_bytes > limits.max_source_bytes {
        violations.push(LimitViolation {
            limit_name: "max_source_bytes".to_string(),
            limit_value: limits.max_source_bytes.to_string(),
            actual_value: source_bytes.to_string(),
            message: format!(
                "Submission is {} bytes, maximum allowed is {}",
                source_bytes, limits.max_source_bytes
            ),
        });
    }

    if source_bytes == 0 {
        violations.push(LimitViolation {
            limit_name: "min_source_bytes".to_string(),
            limit_value: "1".to_string(),
            actual_value: "0".to_string(),
            message: "Submission is empty".to_string(),
        });
    }

    LimitValidationResult {
        passed: violations.is_empty(),
        violations,
    }
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.timeout, Duration::from_millis(5_000));
        assert_eq!(limits.max_loop_iterations, 100_000);
        assert_eq!(limits.max_recursion_depth, 1_000);
        assert_eq!(limits.max_parallel_runs, 10);
    }

    #[test]
    fn test_strict_limits() {
        let limits = ExecutionLimits::strict();
        assert_eq!(limits.max_loop_iterations, 10_000);
        assert_eq!(limits.max_recursion_depth, 100);
    }

    #[test]
    fn test_with_timeout_ms() {
        let limits = ExecutionLimits::default().with_timeout_ms(250);
        assert_eq!(limits.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_limits_ok() {
        let limits = ExecutionLimits::default();
        let result = validate_limits(1_024, &limits);
        assert!(result.passed);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn test_validate_limits_source_too_large() {
        let limits = ExecutionLimits::strict();
        let result = validate_limits(64 * 1024, &limits);
        assert!(!result.passed);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].limit_name, "max_source_bytes");
    }

    #[test]
    fn test_validate_limits_empty_source() {
        let limits = ExecutionLimits::default();
        let result = validate_limits(0, &limits);
        assert!(!result.passed);
        assert_eq!(result.violations[0].limit_name, "min_source_bytes");
    }
}
