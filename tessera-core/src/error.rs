use crate::identity::IdentityRejection;
use crate::repository::StoreError;

/// Category of a reservation failure, used by the transport layer to pick a
/// status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    SaleWindow,
    NotFound,
    Conflict,
    IdentityVerification(IdentityRejection),
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    // Validation
    #[error("order must contain at least one item")]
    EmptyOrder,
    #[error("invalid buyer field: {field}")]
    InvalidBuyerField { field: &'static str },
    #[error("invalid field {field} on item {index}")]
    InvalidItemField { index: usize, field: &'static str },
    #[error("purchase of {requested} items exceeds the limit of {limit}")]
    PurchaseQuantityExceedsLimit { requested: u32, limit: u32 },
    #[error("payment method {0} is not available")]
    PaymentMethodInvalid(String),
    #[error("identity token used more than once in the request")]
    DuplicateIdentityInPayload,
    #[error("seat {0} requested more than once")]
    DuplicateSeatInPayload(String),
    #[error("item {index} must select a seat")]
    SeatSelectionRequired { index: usize },
    #[error("item {index} is missing an identity token")]
    MissingIdentityToken { index: usize },
    #[error("at least one ticket holder must be an adult")]
    NoAdultInTransaction,

    // Sale window
    #[error("ticket sale has not started")]
    SaleNotStarted,
    #[error("ticket sale is already over")]
    SaleAlreadyOver,
    #[error("ticket sale is paused")]
    SalePaused,

    // Not found
    #[error("event not found")]
    EventNotFound,
    #[error("ticket category not found")]
    TicketCategoryNotFound,
    #[error("venue sector not found")]
    SectorNotFound,
    #[error("seat {0} does not exist")]
    BookedSeatNotFound(String),
    #[error("order not found")]
    OrderNotFound,

    // Conflict
    #[error("ticket is out of stock")]
    TicketOutOfStock,
    #[error("seat is already booked")]
    SeatAlreadyBooked,
    #[error("seat {0} is not available")]
    SeatNotAvailable(String),
    #[error("identity has already been used for this event")]
    IdentityAlreadyUsed,
    #[error("buyer already has an order for this event")]
    DuplicateOrder,

    #[error("identity verification failed for item {index}: {rejection}")]
    IdentityVerificationFailed { index: usize, rejection: IdentityRejection },

    // Infrastructure
    #[error("storage failure: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReservationError {
    pub fn kind(&self) -> ErrorKind {
        use ReservationError::*;
        match self {
            EmptyOrder
            | InvalidBuyerField { .. }
            | InvalidItemField { .. }
            | PurchaseQuantityExceedsLimit { .. }
            | PaymentMethodInvalid(_)
            | DuplicateIdentityInPayload
            | DuplicateSeatInPayload(_)
            | SeatSelectionRequired { .. }
            | MissingIdentityToken { .. }
            | NoAdultInTransaction => ErrorKind::Validation,
            SaleNotStarted | SaleAlreadyOver | SalePaused => ErrorKind::SaleWindow,
            EventNotFound | TicketCategoryNotFound | SectorNotFound | BookedSeatNotFound(_) | OrderNotFound => {
                ErrorKind::NotFound
            }
            TicketOutOfStock | SeatAlreadyBooked | SeatNotAvailable(_) | IdentityAlreadyUsed | DuplicateOrder => {
                ErrorKind::Conflict
            }
            IdentityVerificationFailed { rejection, .. } => ErrorKind::IdentityVerification(rejection.clone()),
            Store(_) | Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable numeric code. Business errors sit below 9000, infrastructure
    /// errors at 9000 and above.
    pub fn code(&self) -> u16 {
        use ReservationError::*;
        match self {
            EmptyOrder => 1001,
            InvalidBuyerField { .. } => 1002,
            InvalidItemField { .. } => 1003,
            PurchaseQuantityExceedsLimit { .. } => 1004,
            PaymentMethodInvalid(_) => 1005,
            DuplicateIdentityInPayload => 1006,
            DuplicateSeatInPayload(_) => 1007,
            SeatSelectionRequired { .. } => 1008,
            MissingIdentityToken { .. } => 1009,
            NoAdultInTransaction => 1010,
            SaleNotStarted => 1101,
            SaleAlreadyOver => 1102,
            SalePaused => 1103,
            EventNotFound => 1201,
            TicketCategoryNotFound => 1202,
            SectorNotFound => 1203,
            BookedSeatNotFound(_) => 1204,
            OrderNotFound => 1205,
            TicketOutOfStock => 1301,
            SeatAlreadyBooked => 1302,
            SeatNotAvailable(_) => 1303,
            IdentityAlreadyUsed => 1304,
            DuplicateOrder => 1305,
            IdentityVerificationFailed { rejection, .. } => match rejection {
                IdentityRejection::NotFound => 1401,
                IdentityRejection::Blacklisted => 1402,
                IdentityRejection::Invalid => 1403,
                IdentityRejection::Rejected(_) => 1404,
                IdentityRejection::ServiceUnavailable(_) => 1405,
            },
            Internal(_) => 9000,
            Store(_) => 9001,
        }
    }

    pub fn is_business_error(&self) -> bool {
        self.code() < 9000
    }
}

impl From<StoreError> for ReservationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfStock => ReservationError::TicketOutOfStock,
            StoreError::SeatConflict => ReservationError::SeatAlreadyBooked,
            StoreError::IdentityConflict => ReservationError::IdentityAlreadyUsed,
            StoreError::DuplicateBuyer => ReservationError::DuplicateOrder,
            StoreError::Database(msg) => ReservationError::Store(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflicts_become_business_errors() {
        let err: ReservationError = StoreError::SeatConflict.into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.code(), 1302);

        let err: ReservationError = StoreError::Database("connection reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_business_error());
    }

    #[test]
    fn test_identity_rejections_keep_their_sub_kind() {
        let err = ReservationError::IdentityVerificationFailed {
            index: 1,
            rejection: IdentityRejection::Blacklisted,
        };
        assert_eq!(err.kind(), ErrorKind::IdentityVerification(IdentityRejection::Blacklisted));
        assert_eq!(err.code(), 1402);
    }
}
