// SPDX-License-Identifier: Apache-2.0 OR MIT
use crate::ast::Span;

/// Errors surfaced by parsing or rendering a template.
///
/// Most malformed input never reaches this type: unmatched tag pairs
/// degrade to literal text, unknown helpers and partials are no-ops, and
/// unresolvable keys render as nothing. What remains fatal is broken
/// tag-body syntax, an unterminated escape block, a partial that includes
/// itself, and helper failures at render time. Where the offending region
/// is known its byte `Span` rides along.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The template source could not be turned into an AST.
    #[error("parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        span: Option<Span>,
    },
    /// A helper raised while the template was being rendered.
    #[error("render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        span: Option<Span>,
    },
}

impl Error {
    pub fn parse(message: impl Into<String>, span: Option<Span>) -> Self {
        Error::Parse {
            message: message.into(),
            source: None,
            span,
        }
    }

    pub fn parse_with_span(message: impl Into<String>, span: Span) -> Self {
        Self::parse(message, Some(span))
    }

    pub fn render(message: impl Into<String>, span: Option<Span>) -> Self {
        Error::Render {
            message: message.into(),
            source: None,
            span,
        }
    }

    /// Span of the template region this error points at, if known.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Parse { span, .. } | Error::Render { span, .. } => *span,
        }
    }

    /// True for errors raised before any output was produced.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }
}
