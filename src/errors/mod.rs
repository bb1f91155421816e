//! # Módulo de Códigos de Erro Estruturados
//!
//! Define códigos de erro padronizados para melhor UX e integração
//! com o front-end (editor, painéis de resultado, animações).
//!
//! ## Para todos entenderem:
//!
//! Quando algo dá errado, este módulo fornece códigos únicos
//! que identificam exatamente o que aconteceu.
//!
//! ## Categorias de Erro
//!
//! | Faixa  | Categoria        | Descrição                            |
//! |--------|------------------|--------------------------------------|
//! | E1xxx  | Instrumentação   | Erro de parse/sintaxe da submissão   |
//! | E2xxx  | Execução         | Erro em runtime dentro da sandbox    |
//! | E3xxx  | Assertion        | A submissão rodou mas não passou     |
//! | E4xxx  | Pattern/Config   | Gate de padrões ou setup/ambiente    |
//! | E5xxx  | Interno          | Bug no próprio motor                 |
//!
//! Nenhum destes erros é lançado para o chamador: todos viram strings
//! no campo `error` de `TestResult` / `StepCaptureResult`.

use std::fmt;

// ============================================================================
// CÓDIGO DE ERRO
// ============================================================================

/// Código de erro estruturado com categoria e número.
///
/// O código é um número de 4 dígitos onde:
/// - Primeiro dígito: categoria (1-5)
/// - Últimos 3 dígitos: erro específico (001-999)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // ========================================================================
    // E1xxx: Instrumentação / Parse
    // ========================================================================
    // Erros detectados antes de executar qualquer coisa.
    // O problema está no texto da submissão.

    /// Sintaxe inválida na submissão.
    pub const SYNTAX_ERROR: Self = Self(1001);

    /// Delimitadores desbalanceados ({}, [], ()).
    pub const UNBALANCED_DELIMITERS: Self = Self(1002);

    /// Atribuição com lado direito vazio (`let x =;`).
    pub const EMPTY_ASSIGNMENT: Self = Self(1003);

    /// Submissão vazia ou só espaços.
    pub const EMPTY_SUBMISSION: Self = Self(1004);

    /// Nenhuma função encontrada para testar.
    pub const NO_ENTRY_POINT: Self = Self(1005);

    // ========================================================================
    // E2xxx: Execução na sandbox
    // ========================================================================

    /// Timeout de relógio de parede; a sandbox foi derrubada.
    pub const EXECUTION_TIMEOUT: Self = Self(2001);

    /// Loop estourou o limite de iterações instrumentado.
    pub const INFINITE_LOOP: Self = Self(2002);

    /// Recursão estourou a profundidade máxima.
    pub const RECURSION_LIMIT: Self = Self(2003);

    /// Erro de runtime lançado pelo código do usuário.
    pub const RUNTIME_ERROR: Self = Self(2004);

    /// Canal da sandbox fechou sem mensagem terminal.
    pub const SANDBOX_CHANNEL_CLOSED: Self = Self(2005);

    // ========================================================================
    // E3xxx: Assertions
    // ========================================================================
    // O código executou, mas a validação do desafio falhou.

    /// Uma assertion do desafio falhou.
    pub const ASSERTION_FAILED: Self = Self(3001);

    // ========================================================================
    // E4xxx: Pattern gate / Configuração
    // ========================================================================

    /// A submissão não exibe o padrão algorítmico exigido.
    pub const PATTERN_REQUIREMENT: Self = Self(4001);

    /// Arquivo de desafio não encontrado.
    pub const CHALLENGE_FILE_NOT_FOUND: Self = Self(4002);

    /// JSON do desafio com formato inválido.
    pub const INVALID_CHALLENGE_FORMAT: Self = Self(4003);

    /// Submissão excede os limites configurados.
    pub const LIMITS_EXCEEDED: Self = Self(4004);

    // ========================================================================
    // E5xxx: Erros Internos
    // ========================================================================
    // Bugs no próprio motor. Se você ver esses, reporte!

    /// Erro interno inesperado.
    pub const INTERNAL_ERROR: Self = Self(5001);

    /// Erro de serialização interna.
    pub const SERIALIZATION_ERROR: Self = Self(5002);

    // ========================================================================
    // MÉTODOS
    // ========================================================================

    /// Classifica uma mensagem de erro do motor no código
    /// correspondente. Mensagens desconhecidas caem em RUNTIME_ERROR
    /// (o caminho mais comum: erro do código do usuário).
    pub fn classify(message: &str) -> Self {
        if message.contains("Infinite loop detected") {
            Self::INFINITE_LOOP
        } else if message.contains("Maximum recursion depth exceeded") {
            Self::RECURSION_LIMIT
        } else if message.contains("timed out") {
            Self::EXECUTION_TIMEOUT
        } else if message.starts_with("Syntax error") {
            Self::SYNTAX_ERROR
        } else if message.contains("Could not find a function") {
            Self::NO_ENTRY_POINT
        } else if message.starts_with("Expected ") {
            Self::ASSERTION_FAILED
        } else if message.contains("channel closed") {
            Self::SANDBOX_CHANNEL_CLOSED
        } else {
            Self::RUNTIME_ERROR
        }
    }

    /// Retorna o código numérico.
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Retorna o código formatado com prefixo "E".
    ///
    /// Exemplo: ErrorCode::INFINITE_LOOP.formatted() == "E2002"
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    /// Retorna a categoria do erro baseado no primeiro dígito.
    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Instrumentation,
            2 => ErrorCategory::Execution,
            3 => ErrorCategory::Assertion,
            4 => ErrorCategory::PatternConfig,
            5 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Retorna uma descrição curta do erro.
    pub fn description(&self) -> &'static str {
        match self.0 {
            1001 => "Sintaxe inválida",
            1002 => "Delimitadores desbalanceados",
            1003 => "Atribuição vazia",
            1004 => "Submissão vazia",
            1005 => "Nenhuma função encontrada",
            2001 => "Timeout de execução",
            2002 => "Loop infinito detectado",
            2003 => "Limite de recursão excedido",
            2004 => "Erro de runtime",
            2005 => "Canal da sandbox fechou",
            3001 => "Assertion falhou",
            4001 => "Padrão algorítmico exigido ausente",
            4002 => "Arquivo de desafio não encontrado",
            4003 => "Formato de desafio inválido",
            4004 => "Limites excedidos",
            5001 => "Erro interno",
            5002 => "Erro de serialização",
            _ => "Erro desconhecido",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

// ============================================================================
// CATEGORIA DE ERRO
// ============================================================================

/// Categoria de erro baseada no primeiro dígito do código.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Erros de instrumentação/parse (E1xxx).
    Instrumentation,

    /// Erros de execução na sandbox (E2xxx).
    Execution,

    /// Erros de assertion (E3xxx).
    Assertion,

    /// Gate de padrões e configuração (E4xxx).
    PatternConfig,

    /// Erros internos (E5xxx).
    Internal,

    /// Categoria desconhecida.
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instrumentation => write!(f, "Instrumentação"),
            Self::Execution => write!(f, "Execução"),
            Self::Assertion => write!(f, "Assertion"),
            Self::PatternConfig => write!(f, "Pattern/Configuração"),
            Self::Internal => write!(f, "Interno"),
            Self::Unknown => write!(f, "Desconhecido"),
        }
    }
}

/// Erro estruturado com código, mensagem e contexto.
#[derive(Debug)]
pub struct StructuredError {
    /// Código do erro.
    pub code: ErrorCode,
    /// Mensagem detalhada.
    pub message: String,
    /// Contexto adicional (desafio, correlação, etc.).
    pub context: Option<ErrorContext>,
}

/// Contexto adicional do erro.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// ID do desafio em execução.
    pub challenge_id: Option<String>,
    /// ID de correlação da run.
    pub correlation_id: Option<String>,
    /// Valor esperado.
    pub expected: Option<String>,
    /// Valor obtido.
    pub actual: Option<String>,
}

impl StructuredError {
    /// Cria um novo erro estruturado.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Adiciona contexto ao erro.
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Adiciona o desafio ao contexto.
    pub fn with_challenge_id(mut self, challenge_id: impl Into<String>) -> Self {
        let ctx = self.context.get_or_insert_with(ErrorContext::default);
        ctx.challenge_id = Some(challenge_id.into());
        self
    }

    /// Formata o erro para exibição ao usuário.
    pub fn user_message(&self) -> String {
        let mut msg = format!("[{}] {}", self.code, self.message);

        if let Some(ctx) = &self.context {
            if let Some(challenge_id) = &ctx.challenge_id {
                msg.push_str(&format!(" (challenge: {})", challenge_id));
            }
            if let Some(expected) = &ctx.expected {
                if let Some(actual) = &ctx.actual {
                    msg.push_str(&format!(" [esperado: {}, obtido: {}]", expected, actual));
                }
            }
        }

        msg
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for StructuredError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_engine_messages() {
        assert_eq!(
            ErrorCode::classify("Infinite loop detected: loop exceeded 100000 iterations"),
            ErrorCode::INFINITE_LOOP
        );
        assert_eq!(
            ErrorCode::classify("Maximum recursion depth exceeded"),
            ErrorCode::RECURSION_LIMIT
        );
        assert_eq!(
            ErrorCode::classify("Execution timed out after 5000 ms"),
            ErrorCode::EXECUTION_TIMEOUT
        );
        assert_eq!(
            ErrorCode::classify("Expected [1,2] to equal [2,1]"),
            ErrorCode::ASSERTION_FAILED
        );
        assert_eq!(
            ErrorCode::classify("Variable not found: foo"),
            ErrorCode::RUNTIME_ERROR
        );
    }

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::SYNTAX_ERROR.formatted(), "E1001");
        assert_eq!(ErrorCode::EXECUTION_TIMEOUT.formatted(), "E2001");
        assert_eq!(ErrorCode::ASSERTION_FAILED.formatted(), "E3001");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(
            ErrorCode::SYNTAX_ERROR.category(),
            ErrorCategory::Instrumentation
        );
        assert_eq!(
            ErrorCode::INFINITE_LOOP.category(),
            ErrorCategory::Execution
        );
        assert_eq!(
            ErrorCode::ASSERTION_FAILED.category(),
            ErrorCategory::Assertion
        );
        assert_eq!(
            ErrorCode::PATTERN_REQUIREMENT.category(),
            ErrorCategory::PatternConfig
        );
        assert_eq!(ErrorCode::INTERNAL_ERROR.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_structured_error_display() {
        let err = StructuredError::new(ErrorCode::INFINITE_LOOP, "Loop excedeu 100000 iterações")
            .with_challenge_id("array-sort-easy");

        let msg = err.user_message();
        assert!(msg.contains("E2002"));
        assert!(msg.contains("array-sort-easy"));
        assert!(msg.contains("Loop excedeu"));
    }

    #[test]
    fn test_structured_error_with_context() {
        let err = StructuredError::new(ErrorCode::ASSERTION_FAILED, "Resultado não corresponde")
            .with_context(ErrorContext {
                challenge_id: Some("array-sort-medium".to_string()),
                correlation_id: None,
                expected: Some("[1,2,3]".to_string()),
                actual: Some("[3,2,1]".to_string()),
            });

        let msg = err.user_message();
        assert!(msg.contains("esperado: [1,2,3]"));
        assert!(msg.contains("obtido: [3,2,1]"));
    }
}
