use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of an order. `draft` is the only initial state; `delivered`
/// and `cancelled` are terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Reasons a requested status change is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("order must be in transit before it can be marked as delivered")]
    DeliveredRequiresInTransit,
    #[error("order must be preparing before it can be marked as in transit")]
    InTransitRequiresPreparing,
    #[error("cannot transition order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Transition rule for explicit status updates. `draft -> preparing` is
    /// only reachable through submission, so it is rejected here.
    pub fn check_transition(self, to: OrderStatus) -> Result<(), TransitionError> {
        use OrderStatus::*;
        match (self, to) {
            (Preparing, InTransit) | (InTransit, Delivered) => Ok(()),
            (Draft, Cancelled) | (Preparing, Cancelled) => Ok(()),
            (from, Delivered) if from != InTransit => {
                Err(TransitionError::DeliveredRequiresInTransit)
            }
            (from, InTransit) if from != Preparing => {
                Err(TransitionError::InTransitRequiresPreparing)
            }
            (from, to) => Err(TransitionError::NotAllowed { from, to }),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash_on_delivery")]
    CashOnDelivery,
    #[sea_orm(string_value = "gcash")]
    Gcash,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryOption {
    #[sea_orm(string_value = "pickup")]
    Pickup,
    #[sea_orm(string_value = "deliver")]
    Deliver,
}

/// The `orders` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub store_id: i32,
    pub supplier_id: i32,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub payment_proof_url: Option<String>,
    pub delivery_option: Option<DeliveryOption>,
    pub delivery_fee: Decimal,
    pub distance: Decimal,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub invoice_url: Option<String>,
    /// `"{store_id}:{supplier_id}"` while the order is a draft, NULL afterwards.
    #[serde(skip)]
    pub draft_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Whether `user_id` is one of the two trading parties on this order.
    pub fn involves(&self, user_id: i32) -> bool {
        self.store_id == user_id || self.supplier_id == user_id
    }

    /// The trading party opposite `user_id`.
    pub fn counterparty_of(&self, user_id: i32) -> i32 {
        if self.store_id == user_id {
            self.supplier_id
        } else {
            self.store_id
        }
    }
}

pub fn draft_key(store_id: i32, supplier_id: i32) -> String {
    format!("{}:{}", store_id, supplier_id)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::message::Entity")]
    Message,
    #[sea_orm(has_many = "super::rating::Entity")]
    Rating,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl Related<super::rating::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rating.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;
    use OrderStatus::*;

    const ALL: [OrderStatus; 5] = [Draft, Preparing, InTransit, Delivered, Cancelled];

    #[test]
    fn forward_edges_are_allowed() {
        assert!(Preparing.check_transition(InTransit).is_ok());
        assert!(InTransit.check_transition(Delivered).is_ok());
        assert!(Draft.check_transition(Cancelled).is_ok());
        assert!(Preparing.check_transition(Cancelled).is_ok());
    }

    #[test]
    fn skipping_states_reports_the_missing_step() {
        assert_eq!(
            Preparing.check_transition(Delivered),
            Err(TransitionError::DeliveredRequiresInTransit)
        );
        assert_eq!(
            Draft.check_transition(InTransit),
            Err(TransitionError::InTransitRequiresPreparing)
        );
        assert_eq!(
            Preparing.check_transition(Preparing).unwrap_err().to_string(),
            "cannot transition order from preparing to preparing"
        );
        assert_eq!(
            InTransit.check_transition(Cancelled).unwrap_err().to_string(),
            "cannot transition order from in_transit to cancelled"
        );
    }

    #[test]
    fn status_names_round_trip_through_strings() {
        assert_eq!(OrderStatus::from_str("in_transit").unwrap(), InTransit);
        assert!(OrderStatus::from_str("shipped").is_err());
        assert_eq!(PaymentMethod::from_str("gcash").unwrap(), PaymentMethod::Gcash);
        assert_eq!(
            DeliveryOption::from_str("deliver").unwrap(),
            DeliveryOption::Deliver
        );
    }

    #[test]
    fn counterparty_is_the_other_side() {
        let now = Utc::now();
        let order = Model {
            id: 1,
            store_id: 7,
            supplier_id: 3,
            status: Draft,
            total_amount: Decimal::ZERO,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            payment_proof_url: None,
            delivery_option: None,
            delivery_fee: Decimal::ZERO,
            distance: Decimal::ZERO,
            shipping_address: None,
            notes: None,
            invoice_url: None,
            draft_key: Some(draft_key(7, 3)),
            created_at: now,
            updated_at: now,
        };
        assert!(order.involves(7) && order.involves(3) && !order.involves(4));
        assert_eq!(order.counterparty_of(7), 3);
        assert_eq!(order.counterparty_of(3), 7);
        assert_eq!(order.draft_key.as_deref(), Some("7:3"));
    }

    proptest! {
        #[test]
        fn terminal_states_never_move(from in 3usize..5, to in 0usize..5) {
            prop_assert!(ALL[from].is_terminal());
            prop_assert!(ALL[from].check_transition(ALL[to]).is_err());
        }

        #[test]
        fn nothing_returns_to_draft_or_stays_put(from in 0usize..5) {
            prop_assert!(ALL[from].check_transition(Draft).is_err());
            prop_assert!(ALL[from].check_transition(ALL[from]).is_err());
        }
    }
}
