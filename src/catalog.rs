use crate::model::InventoryEntry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// The always-free food. Never removed from the inventory.
pub const BASIC_FOOD_ID: &str = "food_grasshoppers";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Food,
    Toy,
    Furniture,
    Decoration,
    Hat,
    Accessory,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 6] = [
        ItemCategory::Food,
        ItemCategory::Toy,
        ItemCategory::Furniture,
        ItemCategory::Decoration,
        ItemCategory::Hat,
        ItemCategory::Accessory,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ItemCategory::Food => "Food",
            ItemCategory::Toy => "Toys",
            ItemCategory::Furniture => "Furniture",
            ItemCategory::Decoration => "Decorations",
            ItemCategory::Hat => "Hats",
            ItemCategory::Accessory => "Accessories",
        }
    }

    pub fn is_placeable(self) -> bool {
        matches!(self, ItemCategory::Furniture | ItemCategory::Decoration)
    }

    pub fn is_wearable(self) -> bool {
        matches!(self, ItemCategory::Hat | ItemCategory::Accessory)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: u32,
    pub category: ItemCategory,
    pub unlock_level: u32,
    /// Part of the starting inventory of a fresh game.
    #[serde(default)]
    pub starter: bool,
}

impl Item {
    pub fn is_consumable(&self) -> bool {
        self.category == ItemCategory::Food
    }

    pub fn is_basic_food(&self) -> bool {
        self.id == BASIC_FOOD_ID
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FoodTier {
    Basic,
    Good,
    Premium,
    Super,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FoodEffect {
    pub(crate) hunger: f64,
    pub(crate) happiness: f64,
    pub(crate) tier: FoodTier,
}

pub(crate) const BASIC_FOOD_EFFECT: FoodEffect = FoodEffect {
    hunger: 0.2,
    happiness: 0.05,
    tier: FoodTier::Basic,
};

/// Unknown ids fall through to the basic effect.
pub(crate) fn food_effect(item_id: &str) -> FoodEffect {
    let (hunger, happiness, tier) = match item_id {
        "food_pika" => (0.3, 0.1, FoodTier::Good),
        "food_partridge" => (0.4, 0.15, FoodTier::Good),
        "food_marmot" => (0.5, 0.2, FoodTier::Premium),
        "food_chicken" => (0.6, 0.25, FoodTier::Premium),
        "food_fish" => (0.7, 0.3, FoodTier::Super),
        _ => return BASIC_FOOD_EFFECT,
    };
    FoodEffect {
        hunger,
        happiness,
        tier,
    }
}

/// Read-only item reference data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn builtin() -> Self {
        fn item(
            id: &str,
            name: &str,
            description: &str,
            price: u32,
            category: ItemCategory,
            unlock_level: u32,
            starter: bool,
        ) -> Item {
            Item {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                price,
                category,
                unlock_level,
                starter,
            }
        }

        use ItemCategory::*;
        Self::new(vec![
            item(BASIC_FOOD_ID, "Grasshoppers", "Common food for your manul - always free", 0, Food, 1, true),
            item("food_pika", "Pika", "A tasty small mammal", 15, Food, 1, false),
            item("food_partridge", "Partridge", "A flavorful bird", 30, Food, 2, false),
            item("food_marmot", "Marmot", "A favorite high-calorie meal", 45, Food, 3, false),
            item("food_chicken", "Chicken", "Premium protein source", 60, Food, 4, false),
            item("food_fish", "Fish", "Super premium food for special occasions", 75, Food, 5, false),
            item("hat_beanie", "Beanie", "A cozy hat for cold weather", 50, Hat, 2, false),
            item("accessory_bowtie", "Bow Tie", "For formal occasions", 40, Accessory, 2, false),
            item("furniture_bed", "Cozy Bed", "A comfy bed for your manul", 100, Furniture, 3, false),
            item("decoration_plant", "Plant", "Adds some nature to the manor", 75, Decoration, 3, false),
            item("toy_ball", "Yarn Ball", "A fun toy to play with", 30, Toy, 1, true),
        ])
    }

    /// Loads a JSON array of items. The basic food is appended if the file
    /// leaves it out, since feeding relies on it.
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let mut items: Vec<Item> = serde_json::from_str(&s)
            .with_context(|| format!("parsing catalog {}", path.display()))?;
        if !items.iter().any(Item::is_basic_food) {
            if let Some(basic) = Self::builtin().get(BASIC_FOOD_ID) {
                items.insert(0, basic.clone());
            }
        }
        Ok(Self::new(items))
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn in_category(&self, category: ItemCategory) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |i| i.category == category)
    }

    pub fn basic_food(&self) -> Option<&Item> {
        self.get(BASIC_FOOD_ID)
    }

    pub(crate) fn starter_inventory(&self) -> Vec<InventoryEntry> {
        self.items
            .iter()
            .filter(|i| i.starter)
            .map(|i| InventoryEntry {
                item_id: i.id.clone(),
                purchased: true,
                quantity: 0,
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn food_tiers_strictly_increase() {
        let ids = [
            BASIC_FOOD_ID,
            "food_pika",
            "food_partridge",
            "food_marmot",
            "food_chicken",
            "food_fish",
        ];
        let effects: Vec<FoodEffect> = ids.iter().map(|id| food_effect(id)).collect();
        for pair in effects.windows(2) {
            assert!(pair[1].hunger > pair[0].hunger);
            assert!(pair[1].happiness > pair[0].happiness);
        }
        assert_eq!(effects[0].hunger, 0.2);
        assert_eq!(effects[5].hunger, 0.7);
        assert_eq!(effects[5].happiness, 0.3);
    }

    #[test]
    fn unknown_food_is_basic() {
        assert_eq!(food_effect("food_mystery"), BASIC_FOOD_EFFECT);
    }

    #[test]
    fn only_food_is_consumable() {
        let cat = Catalog::builtin();
        for item in cat.items() {
            assert_eq!(item.is_consumable(), item.category == ItemCategory::Food);
        }
    }

    #[test]
    fn starter_inventory_is_grasshoppers_and_ball() {
        let inv = Catalog::builtin().starter_inventory();
        let ids: Vec<&str> = inv.iter().map(|e| e.item_id.as_str()).collect();
        assert_eq!(ids, vec![BASIC_FOOD_ID, "toy_ball"]);
        assert!(inv.iter().all(|e| e.purchased));
    }

    #[test]
    fn load_adds_missing_basic_food() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        fs::write(
            &path,
            r#"[{"id":"hat_crown","name":"Crown","description":"Shiny","price":500,"category":"hat","unlock_level":10}]"#,
        )
        .unwrap();
        let cat = Catalog::load(&path).unwrap();
        assert!(cat.basic_food().is_some());
        assert_eq!(cat.get("hat_crown").map(|i| i.price), Some(500));
        assert!(!cat.get("hat_crown").unwrap().starter);
    }
}
