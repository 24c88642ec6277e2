//! Cart Aggregate

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::value_objects::{CurrencyId, ItemId, Money, MoneyError, Quantity};

/// Storefront cart, keyed by catalog item. Lines iterate in item-id order.
#[derive(Clone, Debug, Default)]
pub struct Cart {
    lines: BTreeMap<ItemId, CartLine>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CartLine {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub currency_id: CurrencyId,
    pub cost: Money,
    pub cost_currency_id: CurrencyId,
    pub digital: bool,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity.value()) }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> { self.lines.values() }
    pub fn get(&self, item_id: ItemId) -> Option<&CartLine> { self.lines.get(&item_id) }
    pub fn len(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    /// True when the cart holds items and none of them needs a physical delivery.
    pub fn is_digital_only(&self) -> bool { !self.is_empty() && self.lines.values().all(|l| l.digital) }

    /// Adds `line.quantity` units, merging into an existing line for the same item.
    pub fn add(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity.is_zero() { return Err(CartError::InvalidQuantity(line.item_id)); }
        match self.lines.get_mut(&line.item_id) {
            Some(existing) => existing.quantity = existing.quantity.add(line.quantity.value()),
            None => { self.lines.insert(line.item_id, line); }
        }
        Ok(())
    }

    /// Sets the quantity of an existing line; anything below 1 removes it.
    pub fn update_quantity(&mut self, item_id: ItemId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 { return self.remove(item_id); }
        let line = self.lines.get_mut(&item_id).ok_or(CartError::ItemNotFound(item_id))?;
        line.quantity = Quantity::new(quantity);
        Ok(())
    }

    pub fn remove(&mut self, item_id: ItemId) -> Result<(), CartError> {
        self.lines.remove(&item_id).ok_or(CartError::ItemNotFound(item_id))?;
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); }

    /// Sum of line totals. Fails if lines are priced in different currencies.
    pub fn subtotal(&self) -> Result<Option<Money>, MoneyError> {
        let mut lines = self.lines.values();
        let Some(first) = lines.next() else { return Ok(None) };
        lines.try_fold(first.line_total(), |acc, l| acc.add(&l.line_total())).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Item {0} is not in the cart")]
    ItemNotFound(ItemId),
    #[error("Quantity for item {0} must be at least 1")]
    InvalidQuantity(ItemId),
}
