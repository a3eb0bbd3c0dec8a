use crate::catalog::{Catalog, Item, ItemCategory};
use crate::model::{clamp_stat, FeedbackKind, GameState, InventoryEntry, PlacedItem, Position, Rules};
use chrono::{DateTime, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Purchased,
    AlreadyOwned,
    LevelLocked,
    InsufficientFunds,
}

/// How an item looks from the shop's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShopStatus {
    pub owned: bool,
    pub locked: bool,
    pub affordable: bool,
    pub quantity: u32,
}

impl GameState {
    fn entry_mut(&mut self, item_id: &str) -> Option<&mut InventoryEntry> {
        self.inventory.iter_mut().find(|e| e.item_id == item_id)
    }

    fn entry(&self, item_id: &str) -> Option<&InventoryEntry> {
        self.inventory.iter().find(|e| e.item_id == item_id)
    }

    fn is_purchased(&self, item_id: &str) -> bool {
        self.entry(item_id).map(|e| e.purchased).unwrap_or(false)
    }

    pub fn purchase(&mut self, item: &Item, now: DateTime<Utc>, rules: &Rules) -> PurchaseOutcome {
        if !item.is_consumable() && self.is_purchased(&item.id) {
            self.notify(
                FeedbackKind::Info,
                format!("You already own {}", item.name),
                now,
                rules,
            );
            return PurchaseOutcome::AlreadyOwned;
        }
        if self.pet.level < item.unlock_level {
            self.notify(
                FeedbackKind::PurchaseFailed,
                format!("{} requires Level {}", item.name, item.unlock_level),
                now,
                rules,
            );
            return PurchaseOutcome::LevelLocked;
        }
        if self.pet.coins < item.price {
            self.notify(
                FeedbackKind::PurchaseFailed,
                format!("Not enough coins to buy {}", item.name),
                now,
                rules,
            );
            return PurchaseOutcome::InsufficientFunds;
        }

        self.pet.coins -= item.price;

        if item.is_consumable() {
            match self.entry_mut(&item.id) {
                Some(e) => {
                    e.quantity = e.quantity.saturating_add(1);
                    e.purchased = true;
                }
                None => self.inventory.push(InventoryEntry {
                    item_id: item.id.clone(),
                    purchased: true,
                    quantity: 1,
                }),
            }
            let qty = self.quantity(&item.id);
            let message = if qty > 1 {
                format!("Purchased {}! {} available", item.name, qty)
            } else {
                format!("Purchased {}!", item.name)
            };
            self.notify(FeedbackKind::PurchaseSuccess, message, now, rules);
        } else {
            match self.entry_mut(&item.id) {
                Some(e) => e.purchased = true,
                None => self.inventory.push(InventoryEntry {
                    item_id: item.id.clone(),
                    purchased: true,
                    quantity: 0,
                }),
            }
            self.notify(
                FeedbackKind::PurchaseSuccess,
                format!("Purchased {}!", item.name),
                now,
                rules,
            );
        }

        PurchaseOutcome::Purchased
    }

    /// Uses up one unit of a consumable. Returns false when there was nothing
    /// to consume. The basic food entry survives reaching zero.
    pub fn consume(&mut self, item: &Item) -> bool {
        if !item.is_consumable() {
            return false;
        }
        let Some(idx) = self.inventory.iter().position(|e| e.item_id == item.id) else {
            return false;
        };

        let basic = item.is_basic_food();
        let had_stock = self.inventory[idx].quantity > 0;
        if had_stock {
            self.inventory[idx].quantity -= 1;
        }
        if self.inventory[idx].quantity == 0 && !basic {
            self.inventory.remove(idx);
        }
        had_stock || basic
    }

    /// Grants consumables without payment (rewards, admin).
    pub fn add_items(&mut self, item: &Item, quantity: u32) {
        if !item.is_consumable() || quantity == 0 {
            return;
        }
        match self.entry_mut(&item.id) {
            Some(e) => e.quantity = e.quantity.saturating_add(quantity),
            None => self.inventory.push(InventoryEntry {
                item_id: item.id.clone(),
                purchased: true,
                quantity,
            }),
        }
    }

    pub fn quantity(&self, item_id: &str) -> u32 {
        self.entry(item_id).map(|e| e.quantity).unwrap_or(0)
    }

    pub fn can_use(&self, item: &Item) -> bool {
        if !item.is_consumable() {
            return self.is_purchased(&item.id);
        }
        item.is_basic_food() || self.quantity(&item.id) > 0
    }

    pub fn shop_status(&self, item: &Item) -> ShopStatus {
        ShopStatus {
            owned: !item.is_consumable() && self.is_purchased(&item.id),
            locked: item.unlock_level > self.pet.level,
            affordable: self.pet.coins >= item.price,
            quantity: self.quantity(&item.id),
        }
    }

    /// Inventory entries whose catalog item falls in `category`.
    pub fn owned_in<'a>(
        &'a self,
        category: ItemCategory,
        catalog: &'a Catalog,
    ) -> impl Iterator<Item = (&'a InventoryEntry, &'a Item)> + 'a {
        self.inventory.iter().filter_map(move |e| {
            catalog
                .get(&e.item_id)
                .filter(|i| i.category == category)
                .map(|i| (e, i))
        })
    }

    /// Places or moves an owned furniture/decoration item. Anything else is
    /// ignored.
    pub fn place(&mut self, item: &Item, position: Position, now: DateTime<Utc>, rules: &Rules) -> bool {
        if !item.category.is_placeable() || !self.can_use(item) {
            return false;
        }
        match self.placed_items.iter_mut().find(|p| p.item_id == item.id) {
            Some(p) => p.position = position,
            None => self.placed_items.push(PlacedItem {
                item_id: item.id.clone(),
                position,
            }),
        }

        self.pet.happiness = clamp_stat(self.pet.happiness + rules.place_happiness);
        let message = format!("{} likes the new decoration!", self.pet.display_name());
        self.notify(FeedbackKind::PlaceItem, message, now, rules);
        true
    }

    /// Returns false, leaving feedback alone, when the item wasn't placed.
    pub fn remove_placed(&mut self, item: &Item, now: DateTime<Utc>, rules: &Rules) -> bool {
        let before = self.placed_items.len();
        self.placed_items.retain(|p| p.item_id != item.id);
        if self.placed_items.len() == before {
            return false;
        }
        self.notify(
            FeedbackKind::RemoveItem,
            format!("Removed {}", item.name),
            now,
            rules,
        );
        true
    }

    /// Equips an owned hat or accessory, evicting whatever was worn in the
    /// same category.
    pub fn wear(&mut self, item: &Item, catalog: &Catalog) -> bool {
        if !item.category.is_wearable() || !self.can_use(item) {
            return false;
        }
        self.pet.worn_items.retain(|worn| {
            catalog
                .get(worn)
                .map(|w| w.category != item.category)
                .unwrap_or(true)
        });
        self.pet.worn_items.insert(item.id.clone());
        true
    }

    pub fn unwear(&mut self, item: &Item) -> bool {
        self.pet.worn_items.remove(&item.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BASIC_FOOD_ID;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, 18, 30, 0).unwrap()
    }

    fn fresh() -> (GameState, Catalog, Rules) {
        let cat = Catalog::builtin();
        let rules = Rules::default();
        let st = GameState::new(t0(), &cat, &rules);
        (st, cat, rules)
    }

    #[test]
    fn purchase_consumable_stacks() {
        let (mut st, cat, rules) = fresh();
        let pika = cat.get("food_pika").unwrap();
        assert_eq!(st.purchase(pika, t0(), &rules), PurchaseOutcome::Purchased);
        assert_eq!(st.purchase(pika, t0(), &rules), PurchaseOutcome::Purchased);
        assert_eq!(st.quantity("food_pika"), 2);
        assert_eq!(st.pet.coins, 70);
        assert_eq!(
            st.feedback.as_ref().unwrap().message,
            "Purchased Pika! 2 available"
        );
    }

    #[test]
    fn purchase_saturates_stack_size() {
        let (mut st, cat, rules) = fresh();
        let pika = cat.get("food_pika").unwrap();
        st.add_items(pika, u32::MAX);
        assert_eq!(st.purchase(pika, t0(), &rules), PurchaseOutcome::Purchased);
        assert_eq!(st.quantity("food_pika"), u32::MAX);
        assert_eq!(st.pet.coins, 85);
    }

    #[test]
    fn purchase_insufficient_funds_changes_nothing() {
        let (mut st, cat, rules) = fresh();
        st.pet.level = 5;
        st.pet.coins = 10;
        let inventory = st.inventory.clone();
        let fish = cat.get("food_fish").unwrap();
        assert_eq!(
            st.purchase(fish, t0(), &rules),
            PurchaseOutcome::InsufficientFunds
        );
        assert_eq!(st.pet.coins, 10);
        assert_eq!(st.inventory, inventory);
        assert_eq!(st.feedback.as_ref().unwrap().kind, FeedbackKind::PurchaseFailed);
    }

    #[test]
    fn purchase_already_owned_changes_nothing() {
        let (mut st, cat, rules) = fresh();
        let ball = cat.get("toy_ball").unwrap();
        let coins = st.pet.coins;
        let inventory = st.inventory.clone();
        assert_eq!(st.purchase(ball, t0(), &rules), PurchaseOutcome::AlreadyOwned);
        assert_eq!(st.pet.coins, coins);
        assert_eq!(st.inventory, inventory);
        assert_eq!(st.feedback.as_ref().unwrap().message, "You already own Yarn Ball");
    }

    #[test]
    fn purchase_checks_level_before_coins() {
        let (mut st, cat, rules) = fresh();
        st.pet.coins = 0;
        let bed = cat.get("furniture_bed").unwrap();
        assert_eq!(st.purchase(bed, t0(), &rules), PurchaseOutcome::LevelLocked);
        assert_eq!(
            st.feedback.as_ref().unwrap().message,
            "Cozy Bed requires Level 3"
        );
    }

    #[test]
    fn purchase_non_consumable_marks_owned() {
        let (mut st, cat, rules) = fresh();
        st.pet.level = 3;
        st.pet.coins = 500;
        let bed = cat.get("furniture_bed").unwrap();
        assert!(!st.can_use(bed));
        assert_eq!(st.purchase(bed, t0(), &rules), PurchaseOutcome::Purchased);
        assert!(st.can_use(bed));
        assert_eq!(st.pet.coins, 400);
        assert!(st.shop_status(bed).owned);
    }

    #[test]
    fn basic_food_entry_survives_zero() {
        let (mut st, cat, _) = fresh();
        let basic = cat.get(BASIC_FOOD_ID).unwrap();
        st.add_items(basic, 2);
        assert!(st.consume(basic));
        assert!(st.consume(basic));
        assert!(st.consume(basic));
        assert_eq!(st.quantity(BASIC_FOOD_ID), 0);
        assert!(st.inventory.iter().any(|e| e.item_id == BASIC_FOOD_ID));
        assert!(st.can_use(basic));
    }

    #[test]
    fn other_food_removed_at_zero() {
        let (mut st, cat, _) = fresh();
        let pika = cat.get("food_pika").unwrap();
        st.add_items(pika, 2);
        assert!(st.consume(pika));
        assert!(st.can_use(pika));
        assert!(st.consume(pika));
        assert!(!st.inventory.iter().any(|e| e.item_id == "food_pika"));
        assert!(!st.can_use(pika));
        assert!(!st.consume(pika));
    }

    #[test]
    fn consume_ignores_non_consumables() {
        let (mut st, cat, _) = fresh();
        let ball = cat.get("toy_ball").unwrap();
        assert!(!st.consume(ball));
        assert!(st.can_use(ball));
    }

    #[test]
    fn place_upserts_and_bumps_happiness() {
        let (mut st, cat, rules) = fresh();
        st.pet.level = 3;
        st.pet.happiness = 0.5;
        let plant = cat.get("decoration_plant").unwrap();
        assert_eq!(st.purchase(plant, t0(), &rules), PurchaseOutcome::Purchased);
        assert!(st.place(plant, Position::new(10.0, 20.0), t0(), &rules));
        assert!(st.place(plant, Position::new(30.0, 40.0), t0(), &rules));
        assert_eq!(st.placed_items.len(), 1);
        assert_eq!(st.placed_items[0].position, Position::new(30.0, 40.0));
        assert!((st.pet.happiness - 0.6).abs() < 1e-9);

        assert!(st.remove_placed(plant, t0(), &rules));
        assert!(st.placed_items.is_empty());
        assert_eq!(st.feedback.as_ref().unwrap().message, "Removed Plant");
    }

    #[test]
    fn place_requires_ownership() {
        let (mut st, cat, rules) = fresh();
        st.pet.happiness = 0.5;
        let bed = cat.get("furniture_bed").unwrap();
        assert!(!st.place(bed, Position::new(1.0, 1.0), t0(), &rules));
        assert!(st.placed_items.is_empty());
        assert_eq!(st.pet.happiness, 0.5);
        assert!(st.feedback.is_none());
    }

    #[test]
    fn removing_an_unplaced_item_is_a_no_op() {
        let (mut st, cat, rules) = fresh();
        let plant = cat.get("decoration_plant").unwrap();
        assert!(!st.remove_placed(plant, t0(), &rules));
        assert!(st.feedback.is_none());
    }

    #[test]
    fn place_rejects_non_decor() {
        let (mut st, cat, rules) = fresh();
        let hat = cat.get("hat_beanie").unwrap();
        assert!(!st.place(hat, Position::default(), t0(), &rules));
        assert!(st.placed_items.is_empty());
    }

    #[test]
    fn wearing_a_hat_evicts_the_old_hat_only() {
        let mut items = Catalog::builtin().items().to_vec();
        items.push(Item {
            id: "hat_crown".to_string(),
            name: "Crown".to_string(),
            description: "Shiny".to_string(),
            price: 10,
            category: ItemCategory::Hat,
            unlock_level: 1,
            starter: false,
        });
        let cat = Catalog::new(items);
        let rules = Rules::default();
        let mut st = GameState::new(t0(), &cat, &rules);
        st.pet.level = 2;
        st.pet.coins = 1000;
        for id in ["hat_beanie", "hat_crown", "accessory_bowtie"] {
            st.purchase(cat.get(id).unwrap(), t0(), &rules);
        }

        st.wear(cat.get("hat_beanie").unwrap(), &cat);
        st.wear(cat.get("accessory_bowtie").unwrap(), &cat);
        st.wear(cat.get("hat_crown").unwrap(), &cat);

        let worn: Vec<&str> = st.pet.worn_items.iter().map(String::as_str).collect();
        assert_eq!(worn, vec!["accessory_bowtie", "hat_crown"]);

        assert!(st.unwear(cat.get("hat_crown").unwrap()));
        assert!(!st.unwear(cat.get("hat_crown").unwrap()));
        assert_eq!(st.pet.worn_items.len(), 1);
    }

    #[test]
    fn wear_requires_ownership() {
        let (mut st, cat, _) = fresh();
        assert!(!st.wear(cat.get("hat_beanie").unwrap(), &cat));
        assert!(!st.wear(cat.get("accessory_bowtie").unwrap(), &cat));
        assert!(st.pet.worn_items.is_empty());
    }

    #[test]
    fn wear_rejects_non_wearables() {
        let (mut st, cat, _) = fresh();
        assert!(!st.wear(cat.get("toy_ball").unwrap(), &cat));
        assert!(st.pet.worn_items.is_empty());
    }

    #[test]
    fn owned_in_filters_by_category() {
        let (st, cat, _) = fresh();
        let toys: Vec<&str> = st
            .owned_in(ItemCategory::Toy, &cat)
            .map(|(_, i)| i.id.as_str())
            .collect();
        assert_eq!(toys, vec!["toy_ball"]);
    }
}
