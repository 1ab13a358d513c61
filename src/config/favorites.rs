use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of connection target a list entry or override key refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Countries,
    Cities,
    Servers,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Countries => "countries",
            Category::Cities => "cities",
            Category::Servers => "servers",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "countries" | "country" => Some(Category::Countries),
            "cities" | "city" => Some(Category::Cities),
            "servers" | "server" => Some(Category::Servers),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-picked targets shown ahead of everything else in the lists.
///
/// With `common` set, every category reads and writes one shared list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Favorites {
    pub countries: Vec<String>,
    pub cities: Vec<String>,
    pub servers: Vec<String>,
    pub common: Vec<String>,
}

impl Favorites {
    pub fn list(&self, category: Category, common: bool) -> &[String] {
        if common {
            return &self.common;
        }
        match category {
            Category::Countries => &self.countries,
            Category::Cities => &self.cities,
            Category::Servers => &self.servers,
        }
    }

    fn list_mut(&mut self, category: Category, common: bool) -> &mut Vec<String> {
        if common {
            return &mut self.common;
        }
        match category {
            Category::Countries => &mut self.countries,
            Category::Cities => &mut self.cities,
            Category::Servers => &mut self.servers,
        }
    }

    pub fn contains(&self, category: Category, common: bool, id: &str) -> bool {
        self.list(category, common).iter().any(|f| f == id)
    }

    /// Append `id` unless already present. Returns whether it was added.
    pub fn add(&mut self, category: Category, common: bool, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.contains(category, common, id) {
            return false;
        }
        self.list_mut(category, common).push(id.to_string());
        true
    }

    pub fn remove(&mut self, category: Category, common: bool, id: &str) -> bool {
        let list = self.list_mut(category, common);
        let before = list.len();
        list.retain(|f| f != id);
        list.len() != before
    }

    /// Favorites present in `items` first (in favorite order), then the rest unchanged
    pub fn order(&self, category: Category, common: bool, items: Vec<String>) -> Vec<String> {
        let favorites = self.list(category, common);
        let mut ordered: Vec<String> = favorites
            .iter()
            .filter(|f| items.contains(f))
            .cloned()
            .collect();
        ordered.extend(items.into_iter().filter(|i| !favorites.contains(i)));
        ordered
    }
}

/// One change to the favorites, parsed from `add cities New York`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteEdit {
    pub add: bool,
    pub category: Category,
    pub id: String,
}

impl FavoriteEdit {
    /// Returns whether the favorites changed
    pub fn apply(&self, favorites: &mut Favorites, common: bool) -> bool {
        if self.add {
            favorites.add(self.category, common, &self.id)
        } else {
            favorites.remove(self.category, common, &self.id)
        }
    }
}

impl FromStr for FavoriteEdit {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let [verb, kind, id @ ..] = words.as_slice() else {
            anyhow::bail!("expected `add|remove <countries|cities|servers> <name>`");
        };
        if id.is_empty() {
            anyhow::bail!("missing favorite name");
        }

        let add = match verb.to_lowercase().as_str() {
            "add" => true,
            "remove" | "rm" => false,
            other => anyhow::bail!("unknown favorite action `{}`", other),
        };
        let category = Category::from_name(kind)
            .ok_or_else(|| anyhow::anyhow!("unknown target kind `{}`", kind))?;

        // The client lists multi-word names with underscores
        Ok(Self {
            add,
            category,
            id: id.join("_"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_is_deduplicated() {
        let mut favs = Favorites::default();
        assert!(favs.add(Category::Countries, false, "Sweden"));
        assert!(!favs.add(Category::Countries, false, "Sweden"));
        assert!(favs.add(Category::Countries, false, "Germany"));
        assert_eq!(favs.countries, names(&["Sweden", "Germany"]));
        assert!(favs.cities.is_empty());
    }

    #[test]
    fn test_common_list_is_shared() {
        let mut favs = Favorites::default();
        favs.add(Category::Cities, true, "Paris");
        assert!(favs.contains(Category::Servers, true, "Paris"));
        assert!(!favs.contains(Category::Cities, false, "Paris"));
        assert!(favs.remove(Category::Countries, true, "Paris"));
        assert!(favs.common.is_empty());
    }

    #[test]
    fn test_order_puts_favorites_first() {
        let mut favs = Favorites::default();
        favs.add(Category::Countries, false, "Sweden");
        favs.add(Category::Countries, false, "Narnia");
        favs.add(Category::Countries, false, "Albania");

        let ordered = favs.order(
            Category::Countries,
            false,
            names(&["Albania", "Germany", "Sweden", "Zambia"]),
        );
        assert_eq!(ordered, names(&["Sweden", "Albania", "Germany", "Zambia"]));
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::from_name("City"), Some(Category::Cities));
        assert_eq!(Category::from_name("servers"), Some(Category::Servers));
        assert_eq!(Category::from_name("planets"), None);
        assert_eq!(Category::Countries.to_string(), "countries");
    }

    #[test]
    fn test_favorite_edit_parse_and_apply() {
        let edit: FavoriteEdit = "add cities New York".parse().unwrap();
        assert_eq!(
            edit,
            FavoriteEdit {
                add: true,
                category: Category::Cities,
                id: "New_York".to_string(),
            }
        );

        let mut favs = Favorites::default();
        assert!(edit.apply(&mut favs, false));
        assert!(!edit.apply(&mut favs, false));
        assert_eq!(favs.cities, names(&["New_York"]));

        let remove: FavoriteEdit = "remove city New York".parse().unwrap();
        assert!(remove.apply(&mut favs, false));
        assert!(favs.cities.is_empty());

        assert!("add planets Mars".parse::<FavoriteEdit>().is_err());
        assert!("pin countries Sweden".parse::<FavoriteEdit>().is_err());
        assert!("add countries".parse::<FavoriteEdit>().is_err());
    }
}
