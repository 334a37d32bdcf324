use url::Url;

use crate::AlpsResult;

fn has_scheme(s: &str) -> bool {
    ["http://", "https://", "file://", "ftp://"]
        .iter()
        .any(|scheme| s.starts_with(scheme))
}

/// Resolves a `BaseURL` or template value against the current base.
///
/// The query of `base` is carried over unless `reference` brings its own.
pub(crate) fn resolve(base: &Url, reference: &str) -> AlpsResult<Url> {
    if has_scheme(reference) {
        return Ok(Url::parse(reference)?);
    }

    let mut resolved = base.join(reference)?;
    if resolved.query().is_none() && base.query().is_some() {
        resolved.set_query(base.query());
    }
    Ok(resolved)
}
