//! Draft order lines keyed by product.
//!
//! A cart never holds a line whose total quantity is zero: every mutator prunes.

use crate::sizes::{Size, SizeQuantities};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantities: SizeQuantities,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from submitted lines. Repeated product ids are merged in
    /// first-seen order and zero lines are dropped.
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = CartLine>,
    {
        let mut cart = Cart::new();
        for line in lines {
            cart.add(line.product_id, &line.quantities);
        }
        cart
    }

    /// Adds quantities to the product's line, creating it if needed.
    pub fn add(&mut self, product_id: Uuid, quantities: &SizeQuantities) {
        match self.position(product_id) {
            Some(idx) => self.lines[idx].quantities.merge(quantities),
            None => self.lines.push(CartLine {
                product_id,
                quantities: *quantities,
            }),
        }
        self.prune(product_id);
    }

    pub fn set_quantity(&mut self, product_id: Uuid, size: Size, quantity: u32) {
        match self.position(product_id) {
            Some(idx) => self.lines[idx].quantities.set(size, quantity),
            None => self.lines.push(CartLine {
                product_id,
                quantities: SizeQuantities::new().with(size, quantity),
            }),
        }
        self.prune(product_id);
    }

    /// Replaces the product's quantities wholesale.
    pub fn set_quantities(&mut self, product_id: Uuid, quantities: SizeQuantities) {
        match self.position(product_id) {
            Some(idx) => self.lines[idx].quantities = quantities,
            None => self.lines.push(CartLine {
                product_id,
                quantities,
            }),
        }
        self.prune(product_id);
    }

    pub fn remove(&mut self, product_id: Uuid) -> Option<CartLine> {
        self.position(product_id).map(|idx| self.lines.remove(idx))
    }

    pub fn get(&self, product_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| l.quantities.total_quantity())
            .sum()
    }

    fn position(&self, product_id: Uuid) -> Option<usize> {
        self.lines.iter().position(|l| l.product_id == product_id)
    }

    fn prune(&mut self, product_id: Uuid) {
        self.lines
            .retain(|l| l.product_id != product_id || !l.quantities.is_empty());
    }
}
