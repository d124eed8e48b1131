//! Service plan pricing: selling price, discount percent, discount amount
//! and sale price are kept mutually consistent.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::draft::FieldPath;
use crate::error::PricingError;

/// Document section holding the pricing fields.
pub const PRICING_SECTION: &str = "servicePlan";

/// One of the four linked pricing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    SellingPrice,
    DiscountPercent,
    DiscountAmount,
    SalePrice,
}

impl PriceField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::SellingPrice => "sellingPrice",
            Self::DiscountPercent => "discountPercent",
            Self::DiscountAmount => "discountAmount",
            Self::SalePrice => "salePrice",
        }
    }

    /// The pricing field a write targets, if any.
    pub fn from_path(path: &FieldPath) -> Option<Self> {
        match path.segments() {
            [section, field] if section == PRICING_SECTION => match field.as_str() {
                "sellingPrice" => Some(Self::SellingPrice),
                "discountPercent" => Some(Self::DiscountPercent),
                "discountAmount" => Some(Self::DiscountAmount),
                "salePrice" => Some(Self::SalePrice),
                _ => None,
            },
            _ => None,
        }
    }

    fn path(&self) -> FieldPath {
        FieldPath::key(PRICING_SECTION).child(self.key())
    }
}

/// The pricing triple plus its base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pricing {
    pub selling_price: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub sale_price: Decimal,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Numeric value of a JSON field; missing or non-numeric counts as zero.
fn decimal_of(value: Option<&Value>) -> Decimal {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_f64().and_then(|f| Decimal::from_str(&format!("{f:.10}")).ok()))
            .unwrap_or(Decimal::ZERO),
        Some(Value::String(s)) => Decimal::from_str(s.trim()).unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

fn to_json(value: Decimal) -> Value {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::from(0))
}

impl Pricing {
    /// Read the four fields from the `servicePlan` section object.
    pub fn from_section(section: &Value) -> Self {
        Self {
            selling_price: decimal_of(section.get("sellingPrice")),
            discount_percent: decimal_of(section.get("discountPercent")),
            discount_amount: decimal_of(section.get("discountAmount")),
            sale_price: decimal_of(section.get("salePrice")),
        }
    }

    fn percent_of(&self, amount: Decimal) -> Result<Decimal, PricingError> {
        if self.selling_price <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        amount
            .checked_div(self.selling_price)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .map(round2)
            .ok_or(PricingError::Overflow(PriceField::DiscountPercent.key()))
    }

    fn sale_after(&self, amount: Decimal) -> Result<Decimal, PricingError> {
        self.selling_price
            .checked_sub(amount)
            .map(round2)
            .ok_or(PricingError::Overflow(PriceField::SalePrice.key()))
    }

    /// Derive the dependent fields from the one just written.
    ///
    /// A percent that the stored amount already rounds to keeps that amount,
    /// so re-deriving from a derived percent reproduces the same sale price.
    pub fn recompute(mut self, written: PriceField) -> Result<Self, PricingError> {
        match written {
            PriceField::SellingPrice | PriceField::SalePrice => {
                self.discount_amount = self
                    .selling_price
                    .checked_sub(self.sale_price)
                    .map(round2)
                    .ok_or(PricingError::Overflow(PriceField::DiscountAmount.key()))?;
                self.discount_percent = self.percent_of(self.discount_amount)?;
            }
            PriceField::DiscountPercent => {
                let consistent = self.selling_price > Decimal::ZERO
                    && self.percent_of(self.discount_amount)? == self.discount_percent;
                if !consistent {
                    self.discount_amount = self
                        .selling_price
                        .checked_mul(self.discount_percent)
                        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                        .map(round2)
                        .ok_or(PricingError::Overflow(PriceField::DiscountAmount.key()))?;
                }
                self.sale_price = self.sale_after(self.discount_amount)?;
            }
            PriceField::DiscountAmount => {
                self.discount_percent = self.percent_of(self.discount_amount)?;
                self.sale_price = self.sale_after(self.discount_amount)?;
            }
        }
        Ok(self)
    }

    /// Writes for the fields that depend on `written`.
    pub fn dependent_writes(&self, written: PriceField) -> Vec<(FieldPath, Value)> {
        let dependents: &[(PriceField, Decimal)] = match written {
            PriceField::SellingPrice | PriceField::SalePrice => &[
                (PriceField::DiscountAmount, self.discount_amount),
                (PriceField::DiscountPercent, self.discount_percent),
            ],
            PriceField::DiscountPercent => &[
                (PriceField::DiscountAmount, self.discount_amount),
                (PriceField::SalePrice, self.sale_price),
            ],
            PriceField::DiscountAmount => &[
                (PriceField::DiscountPercent, self.discount_percent),
                (PriceField::SalePrice, self.sale_price),
            ],
        };
        dependents
            .iter()
            .map(|(field, value)| (field.path(), to_json(*value)))
            .collect()
    }
}
