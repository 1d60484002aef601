//! Cancelación cooperativa.
//!
//! El runtime nunca interrumpe código de usuario. En su lugar, revisa
//! una señal compartida en fronteras bien definidas: al iniciar un
//! render, antes de cada salto de layout y antes de ejecutar una sección.

use std::{
    fmt::{self, Debug},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::error::RenderError;

/// Señal de cancelación.
///
/// Los clones comparten la misma señal. Dos tokens son iguales si y solo
/// si provienen de la misma señal, lo cual permite comparar la identidad
/// del token que viaja dentro de [`RenderError::Cancelled`].
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Crea una señal nueva, no cancelada.
    pub fn new() -> Self {
        Self::default()
    }

    /// Solicita cancelación. Es seguro invocarlo desde otro hilo.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Indica si ya se solicitó cancelación.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Falla con [`RenderError::Cancelled`] si se solicitó cancelación.
    pub fn check(&self) -> Result<(), RenderError> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled(self.clone()))
        } else {
            Ok(())
        }
    }
}

impl PartialEq for CancellationToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for CancellationToken {}

impl Debug for CancellationToken {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("CancellationToken")
            .field("signal", &Arc::as_ptr(&self.0))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let token = CancellationToken::new();
        let clone = token.clone();

        assert_eq!(token, clone);
        assert_ne!(token, CancellationToken::new());

        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn check_carries_token() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());

        token.cancel();
        match token.check() {
            Err(RenderError::Cancelled(carried)) => assert_eq!(carried, token),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
