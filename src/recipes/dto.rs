use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::recipes::repo::{Ingredient, Recipe, Tag};

/// Body for creating a tag or an ingredient.
#[derive(Debug, Deserialize)]
pub struct AttrBody {
    pub name: String,
}

/// Body for creating a recipe; also the full-replacement (PUT) body.
#[derive(Debug, Deserialize)]
pub struct RecipeBody {
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub ingredients: Vec<Uuid>,
}

/// Partial recipe update. Omitted fields keep their value; a supplied
/// `tags`/`ingredients` array fully replaces the prior set. `link` uses a
/// double Option so "absent" and "null" stay distinguishable.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub link: Option<Option<String>>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<Uuid>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// List/create/update shape: associations as bare id arrays.
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: Option<String>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

impl RecipeSummary {
    pub fn new(recipe: Recipe, tags: Vec<Uuid>, ingredients: Vec<Uuid>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags,
            ingredients,
        }
    }
}

/// Detail shape: associations nested as full objects.
#[derive(Debug, Serialize)]
pub struct RecipeDetails {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: Option<String>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
}

impl RecipeDetails {
    pub fn new(recipe: Recipe, tags: Vec<Tag>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags,
            ingredients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_absent_and_null_link() {
        let absent: RecipePatch = serde_json::from_str(r#"{"title":"Cheesecake"}"#).unwrap();
        assert!(absent.link.is_none());

        let null: RecipePatch = serde_json::from_str(r#"{"link":null}"#).unwrap();
        assert_eq!(null.link, Some(None));

        let set: RecipePatch =
            serde_json::from_str(r#"{"link":"https://example.com/pie"}"#).unwrap();
        assert_eq!(set.link, Some(Some("https://example.com/pie".into())));
    }

    #[test]
    fn patch_association_arrays_default_to_untouched() {
        let patch: RecipePatch = serde_json::from_str(r#"{"price":5.0}"#).unwrap();
        assert!(patch.tags.is_none());
        assert!(patch.ingredients.is_none());

        let replace: RecipePatch = serde_json::from_str(r#"{"tags":[]}"#).unwrap();
        assert_eq!(replace.tags, Some(vec![]));
    }

    #[test]
    fn recipe_body_defaults_associations_to_empty() {
        let body: RecipeBody =
            serde_json::from_str(r#"{"title":"Steak and eggs","time_minutes":20,"price":10.0}"#)
                .unwrap();
        assert!(body.tags.is_empty());
        assert!(body.ingredients.is_empty());
        assert!(body.link.is_none());
    }

    #[test]
    fn summary_serializes_associations_as_ids() {
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Steak and eggs".into(),
            time_minutes: 20,
            price: 10.0,
            link: None,
            created_at: time::OffsetDateTime::now_utc(),
        };
        let tag_id = Uuid::new_v4();
        let json =
            serde_json::to_value(RecipeSummary::new(recipe, vec![tag_id], vec![])).unwrap();
        assert_eq!(json["tags"], serde_json::json!([tag_id]));
        assert_eq!(json["ingredients"], serde_json::json!([]));
        assert!(json.get("user_id").is_none());
    }
}
