#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("order {0} has non-positive quantity")]
    NonPositiveQuantity(crate::ids::OrderId),
    #[error("order {0} has non-positive price")]
    NonPositivePrice(crate::ids::OrderId),
}
