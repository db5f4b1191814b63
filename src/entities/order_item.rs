use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// The `order_items` table. One line per (order, product).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    /// Captured when the line was first added.
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// `quantity * unit_price`, kept to two decimal places.
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Decimal {
    (Decimal::from(quantity) * unit_price).round_dp(2)
}

/// Order total derived from its current lines.
pub fn sum_subtotals<'a>(items: impl IntoIterator<Item = &'a Model>) -> Decimal {
    items
        .into_iter()
        .fold(Decimal::ZERO, |acc, item| acc + item.subtotal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn item(id: i32, quantity: i32, unit_price: Decimal) -> Model {
        let now = Utc::now();
        Model {
            id,
            order_id: 1,
            product_id: id,
            quantity,
            unit_price,
            subtotal: line_subtotal(quantity, unit_price),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn subtotal_multiplies_quantity_and_price() {
        assert_eq!(line_subtotal(5, dec!(100)), dec!(500.00));
        assert_eq!(line_subtotal(3, dec!(19.99)), dec!(59.97));
    }

    #[test]
    fn empty_order_totals_zero() {
        assert_eq!(sum_subtotals(&Vec::<Model>::new()), Decimal::ZERO);
    }

    proptest! {
        #[test]
        fn total_equals_sum_of_lines(lines in prop::collection::vec((1i32..500, 1i64..100_000), 0..20)) {
            let items: Vec<Model> = lines
                .iter()
                .enumerate()
                .map(|(i, (q, cents))| item(i as i32, *q, Decimal::new(*cents, 2)))
                .collect();
            let expected = lines
                .iter()
                .fold(Decimal::ZERO, |acc, (q, cents)| acc + Decimal::from(*q) * Decimal::new(*cents, 2));
            prop_assert_eq!(sum_subtotals(&items), expected);
        }
    }
}
