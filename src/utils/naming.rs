//! Alias and synthetic column naming for one compilation.
//!
//! All generated names MUST come from the [`NameGenerator`] owned by the
//! compilation's arena. There is no process-wide counter: two traversals
//! compiled side by side produce identical names.
//!
//! ## Naming Convention
//! - Relational aliases: `{prefix}_{n}`, prefix by variable type
//!   (`N` vertex, `E` edge, `R` anything else), `n` shared across prefixes
//! - Synthetic columns: `{base}_{m}` with an independent counter
//!
//! Examples:
//! - `V().out()` → `N_0`, `E_1`, `N_2`
//! - ghost column for label `a` → `a_0`, its `name` property → `a_0_name`

#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    next_alias: usize,
    next_column: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh relational alias, e.g. `N_3`.
    pub fn alias(&mut self, prefix: &str) -> String {
        let name = format!("{}_{}", prefix, self.next_alias);
        self.next_alias += 1;
        name
    }

    /// Fresh synthetic column name, e.g. `a_0`.
    pub fn column(&mut self, base: &str) -> String {
        let base = sanitize(base);
        let name = format!("{}_{}", base, self.next_column);
        self.next_column += 1;
        name
    }
}

/// Column name of `property` under a synthetic base column.
///
/// ```
/// use gremlin_translator::utils::naming::synthetic_property_column;
///
/// assert_eq!(synthetic_property_column("a_0", None), "a_0");
/// assert_eq!(synthetic_property_column("a_0", Some("name")), "a_0_name");
/// ```
pub fn synthetic_property_column(base: &str, property: Option<&str>) -> String {
    match property {
        None => base.to_string(),
        Some(p) => format!("{}_{}", base, sanitize(p)),
    }
}

/// Replace characters that cannot appear in an unquoted identifier.
fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "col".to_string()
    } else {
        cleaned
    }
}
