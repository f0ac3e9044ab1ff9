//! Positional decomposition of the 21-character account code.
//!
//! The code packs 13 hierarchical dimensions at fixed offsets. Codes that
//! are not exactly 21 characters are rejected outright so a truncated
//! section header cannot produce silently misfiled records.

use crate::error::{LedgerError, Result};
use crate::models::AccountComponents;

pub const CODE_LEN: usize = 21;

/// Splits a full account code into its 13 named components.
///
/// The input is trimmed first; anything other than exactly 21 characters
/// fails with `MalformedAccountCode` and no partial result.
pub fn decompose(raw: &str) -> Result<AccountComponents> {
    let code: Vec<char> = raw.trim().chars().collect();
    if code.len() != CODE_LEN {
        return Err(LedgerError::MalformedAccountCode {
            code: raw.trim().to_string(),
            length: code.len(),
        });
    }

    let slice = |from: usize, to: usize| code[from..to].iter().collect::<String>();

    Ok(AccountComponents {
        genero: slice(0, 1),
        grupo: slice(1, 2),
        rubro: slice(2, 3),
        cuenta: slice(3, 4),
        subcuenta: slice(4, 5),
        dependencia: slice(5, 7),
        unidad_responsable: slice(7, 9),
        centro_costo: slice(9, 11),
        proyecto_presupuestario: slice(11, 13),
        fuente: slice(13, 14),
        subfuente: slice(14, 16),
        tipo_recurso: slice(16, 17),
        partida_presupuestal: slice(17, 21),
    })
}
