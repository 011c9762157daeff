//! Input-validation collaborator used by the health self-test.
//!
//! The scorer probes the validation layer with one known-good and one
//! known-bad record per guarded entity and asserts the accept/reject
//! outcome, so a silently broken validator surfaces as a failed check
//! instead of bad rows reaching the store later.

use crate::store::Row;

/// External validation layer, as exposed by the owning application.
pub trait ValidationLayer {
    /// Validate a record about to be inserted for `entity`.
    fn validate_create(&self, entity: &str, data: &Row) -> Result<(), String>;
}

/// A self-test probe: `good` must be accepted, `bad` must be rejected.
#[derive(Debug, Clone)]
pub struct ValidationProbe {
    pub entity: String,
    pub good: Row,
    pub bad: Row,
}

impl ValidationProbe {
    pub fn new(entity: &str, good: Row, bad: Row) -> Self {
        Self {
            entity: entity.to_string(),
            good,
            bad,
        }
    }
}

/// Field-presence validator for the core entities, usable when the owning
/// application does not inject its own layer.
pub struct BasicValidation;

impl BasicValidation {
    fn required_fields(entity: &str) -> &'static [&'static str] {
        match entity {
            "usuarios" => &["nombre", "email"],
            "secciones" => &["nombre"],
            "actividades" => &["titulo", "fecha"],
            "documentos" => &["nombre", "ruta"],
            "mensajes" => &["asunto", "cuerpo"],
            _ => &[],
        }
    }
}

impl ValidationLayer for BasicValidation {
    fn validate_create(&self, entity: &str, data: &Row) -> Result<(), String> {
        for field in Self::required_fields(entity) {
            let present = data
                .get(*field)
                .and_then(|v| v.as_str())
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Err(format!("{}: missing required field '{}'", entity, field));
            }
        }

        if entity == "usuarios" {
            let email = data.get("email").and_then(|v| v.as_str()).unwrap_or("");
            if !email.contains('@') {
                return Err(format!("usuarios: invalid email '{}'", email));
            }
        }

        Ok(())
    }
}

/// One good/bad probe pair per guarded entity.
pub fn default_probes() -> Vec<ValidationProbe> {
    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    vec![
        ValidationProbe::new(
            "usuarios",
            row(&[("nombre", "Probe User"), ("email", "probe@example.org")]),
            row(&[("nombre", "Probe User"), ("email", "not-an-email")]),
        ),
        ValidationProbe::new(
            "secciones",
            row(&[("nombre", "Tropa")]),
            row(&[("nombre", "")]),
        ),
        ValidationProbe::new(
            "actividades",
            row(&[("titulo", "Acampada"), ("fecha", "2026-09-01")]),
            row(&[("titulo", "Acampada")]),
        ),
        ValidationProbe::new(
            "documentos",
            row(&[("nombre", "circular.pdf"), ("ruta", "/docs/circular.pdf")]),
            row(&[("ruta", "/docs/circular.pdf")]),
        ),
        ValidationProbe::new(
            "mensajes",
            row(&[("asunto", "Reunion"), ("cuerpo", "Sabado 10:00")]),
            row(&[("asunto", "Reunion"), ("cuerpo", " ")]),
        ),
    ]
}
