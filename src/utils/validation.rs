use crate::error::{ServiceError, ServiceResult};
use crate::models::*;
use crate::utils::extraction::{extract_product, ExtractedProduct};

const MAX_LABEL_LEN: usize = 100;
const MAX_SESSION_ID_LEN: usize = 64;
const MAX_FINGERPRINT_LEN: usize = 50;
const MAX_STRUCTURED_DATA_LEN: usize = 64 * 1024;
const MAX_SIGNALS: usize = 64;

pub fn sanitize_string(input: &str, max_length: usize) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "-_.,!?&'".contains(*c))
        .take(max_length)
        .collect::<String>()
        .trim()
        .to_string()
}

fn sanitize_label(label: Option<&str>) -> Option<String> {
    label
        .map(|l| sanitize_string(l, MAX_LABEL_LEN))
        .filter(|l| !l.is_empty())
}

pub fn validate_session_id(session_id: &str) -> ServiceResult<()> {
    if session_id.is_empty() {
        return Err(ServiceError::BadRequest("Session ID cannot be empty".into()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(ServiceError::BadRequest(format!(
            "Session ID too long (max {} characters)",
            MAX_SESSION_ID_LEN
        )));
    }
    if !session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::BadRequest(
            "Session ID contains invalid characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_fingerprint(fingerprint: Option<&str>) -> ServiceResult<Option<String>> {
    match fingerprint.map(str::trim).filter(|f| !f.is_empty()) {
        None => Ok(None),
        Some(f) if f.len() > MAX_FINGERPRINT_LEN => Err(ServiceError::BadRequest(format!(
            "Fingerprint too long (max {} characters)",
            MAX_FINGERPRINT_LEN
        ))),
        Some(f) => Ok(Some(sanitize_string(f, MAX_FINGERPRINT_LEN))),
    }
}

fn validate_price(price: Option<f64>) -> ServiceResult<Option<f64>> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(ServiceError::BadRequest(
            "Price must be a finite, non-negative number".into(),
        )),
        other => Ok(other),
    }
}

/// Turns a tracking request into an event. `Ok(None)` means there was nothing
/// usable to record and the call is acknowledged as a no-op.
pub fn build_interaction_event(request: &TrackRequest) -> ServiceResult<Option<InteractionEvent>> {
    let price = validate_price(request.price)?;

    if let Some(raw) = &request.structured_data {
        if raw.len() > MAX_STRUCTURED_DATA_LEN {
            return Err(ServiceError::BadRequest("Structured data too large".into()));
        }
    }

    let extracted: Option<ExtractedProduct> =
        if request.structured_data.is_some() || request.hints.is_some() {
            extract_product(
                request.structured_data.as_deref(),
                &request.hints.clone().unwrap_or_default(),
            )
        } else {
            None
        };

    let category = sanitize_label(request.category.as_deref())
        .or_else(|| extracted.as_ref().and_then(|e| sanitize_label(e.category.as_deref())));
    let brand = sanitize_label(request.brand.as_deref())
        .or_else(|| extracted.as_ref().and_then(|e| sanitize_label(e.brand.as_deref())));
    let price = price.or_else(|| extracted.as_ref().and_then(|e| e.price));

    let interaction_type = request.interaction_type;
    match interaction_type {
        InteractionType::ProductClick | InteractionType::AddToCart | InteractionType::WhatsappOrder
            if request.product_id.is_none() =>
        {
            return Err(ServiceError::BadRequest(format!(
                "{} requires a product_id",
                interaction_type.as_str()
            )));
        }
        InteractionType::CategoryBrowse if category.is_none() => return Ok(None),
        InteractionType::ProductView
            if request.product_id.is_none()
                && category.is_none()
                && brand.is_none()
                && price.is_none() =>
        {
            return Ok(None)
        }
        _ => {}
    }

    if request.product_id == Some(0) {
        return Err(ServiceError::BadRequest("Product ID cannot be zero".into()));
    }

    let mut event = InteractionEvent::new(interaction_type);
    event.product_id = request.product_id;
    event.category = category;
    event.brand = brand;
    event.price = price;
    Ok(Some(event))
}

pub fn validate_limit(limit: Option<usize>, default_limit: usize, max_limit: usize) -> ServiceResult<usize> {
    match limit {
        None | Some(0) => Ok(default_limit),
        Some(n) if n > max_limit => Err(ServiceError::BadRequest(format!(
            "Limit too large (max {})",
            max_limit
        ))),
        Some(n) => Ok(n),
    }
}

pub fn validate_user_profile(profile: &UserProfile) -> ServiceResult<()> {
    if profile.categories.len() > MAX_INTERESTS || profile.brands.len() > MAX_INTERESTS {
        return Err(ServiceError::BadRequest(format!(
            "Profile has too many interests (max {})",
            MAX_INTERESTS
        )));
    }

    let prefs = &profile.price_preferences;
    let bounds = [prefs.min, prefs.max, prefs.average];
    for &value in prefs.views.iter().chain(bounds.iter()) {
        if !value.is_finite() || value < 0.0 {
            return Err(ServiceError::BadRequest(
                "Profile price preferences contain invalid values".into(),
            ));
        }
    }

    Ok(())
}

pub fn validate_signals(signals: &[String]) -> ServiceResult<()> {
    if signals.is_empty() {
        return Err(ServiceError::BadRequest("At least one signal is required".into()));
    }
    if signals.len() > MAX_SIGNALS {
        return Err(ServiceError::BadRequest(format!(
            "Too many signals (max {})",
            MAX_SIGNALS
        )));
    }
    Ok(())
}
