use regex::Regex;
use std::sync::LazyLock;

use tessera_core::ReservationError;

use crate::request::ItemRequest;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

// Optional leading +, then 8 to 15 digits.
static PHONE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("valid phone pattern"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE.is_match(value.trim())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// The buyer (order-level contact) is validated for every order.
pub fn validate_buyer(fullname: &str, email: &str) -> Result<(), ReservationError> {
    if fullname.trim().is_empty() {
        return Err(ReservationError::InvalidBuyerField { field: "fullname" });
    }
    if !is_valid_email(email) {
        return Err(ReservationError::InvalidBuyerField { field: "email" });
    }
    Ok(())
}

/// Ticket holder fields, used when the event does not check identities.
pub fn validate_item(index: usize, item: &ItemRequest) -> Result<(), ReservationError> {
    if is_blank(item.fullname.as_deref()) {
        return Err(ReservationError::InvalidItemField { index, field: "fullname" });
    }
    if !item.email.as_deref().map(is_valid_email).unwrap_or(false) {
        return Err(ReservationError::InvalidItemField { index, field: "email" });
    }
    if !item.phone_number.as_deref().map(is_valid_phone).unwrap_or(false) {
        return Err(ReservationError::InvalidItemField { index, field: "phoneNumber" });
    }
    item.seat(index)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> ItemRequest {
        ItemRequest {
            fullname: Some("Dewi Lestari".into()),
            email: Some("dewi@example.com".into()),
            phone_number: Some("+6281234567890".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_and_phone_formats() {
        assert!(is_valid_email("a.b@mail.example.org"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(is_valid_phone("081234567890"));
        assert!(is_valid_phone("+6281234567"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("0812-ABCD-999"));
    }

    #[test]
    fn test_buyer_fields() {
        assert!(validate_buyer("Dewi", "dewi@example.com").is_ok());
        assert!(matches!(
            validate_buyer("  ", "dewi@example.com"),
            Err(ReservationError::InvalidBuyerField { field: "fullname" })
        ));
        assert!(matches!(
            validate_buyer("Dewi", "dewi"),
            Err(ReservationError::InvalidBuyerField { field: "email" })
        ));
    }

    #[test]
    fn test_item_reports_first_bad_field() {
        assert!(validate_item(0, &holder()).is_ok());

        let mut item = holder();
        item.phone_number = None;
        assert!(matches!(
            validate_item(2, &item),
            Err(ReservationError::InvalidItemField { index: 2, field: "phoneNumber" })
        ));

        let mut item = holder();
        item.fullname = Some(String::new());
        item.email = Some("broken".into());
        assert!(matches!(
            validate_item(0, &item),
            Err(ReservationError::InvalidItemField { index: 0, field: "fullname" })
        ));
    }

    #[test]
    fn test_half_seat_is_rejected() {
        let mut item = holder();
        item.seat_row = Some(3);
        assert!(matches!(
            validate_item(1, &item),
            Err(ReservationError::InvalidItemField { index: 1, field: "seatColumn" })
        ));
    }
}
