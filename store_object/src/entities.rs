//! Paint-shop records
//!
//! Plain data as held in the hosted store. Monetary amounts are integer
//! cents.

use crate::traits::Entity;
use cache_system::EntityClass;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub supplier_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub brand_id: String,
    pub supplier_id: String,
    pub colour: Option<String>,
    pub size_ml: u32,
    pub price_cents: i64,
    #[serde(default)]
    pub discontinued: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub project_id: Option<String>,
    pub issued_on: NaiveDate,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub customer_id: String,
    pub status: ProjectStatus,
    pub starts_on: Option<NaiveDate>,
}

macro_rules! impl_entity {
    ($($model:ty => $class:ident),* $(,)?) => {
        $(
            impl Entity for $model {
                const CLASS: EntityClass = EntityClass::$class;

                fn id(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_entity! {
    Supplier => Suppliers,
    Brand => Brands,
    Product => Products,
    Customer => Customers,
    Invoice => Invoices,
    Project => Projects,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classes() {
        assert_eq!(Supplier::CLASS, EntityClass::Suppliers);
        assert_eq!(Invoice::CLASS, EntityClass::Invoices);
    }

    #[test]
    fn test_invoice_decodes_store_row() {
        let invoice: Invoice = serde_json::from_value(json!({
            "id": "I1",
            "number": "INV-0001",
            "customer_id": "C1",
            "project_id": null,
            "issued_on": "2024-03-01",
            "status": "issued",
            "lines": [{"product_id": "P1", "quantity": 2, "unit_price_cents": 4599}]
        }))
        .unwrap();

        assert_eq!(invoice.id(), "I1");
        assert_eq!(invoice.status, InvoiceStatus::Issued);
        assert_eq!(invoice.lines.len(), 1);
    }

    #[test]
    fn test_project_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ProjectStatus::InProgress).unwrap(),
            json!("in_progress")
        );
    }
}
