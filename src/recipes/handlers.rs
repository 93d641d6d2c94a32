use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::token::AuthUser;

use super::dto::{AttrBody, RecipeBody, RecipeDetails, RecipePatch, RecipeSummary};
use super::repo::{Ingredient, Recipe, RecipeFields, Tag};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route(
            "/tags/:id",
            get(get_tag).patch(update_tag).put(update_tag).delete(delete_tag),
        )
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route(
            "/ingredients/:id",
            get(get_ingredient)
                .patch(update_ingredient)
                .put(update_ingredient)
                .delete(delete_ingredient),
        )
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe)
                .patch(patch_recipe)
                .put(put_recipe)
                .delete(delete_recipe),
        )
}

fn require_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    Ok(name)
}

/// Recipe association ids come straight from the payload; a foreign-key or
/// unique violation on their insert is the client's error, not ours.
fn bad_association(e: anyhow::Error) -> ApiError {
    if let Some(db_err) = e
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
    {
        if let Some(api) = association_violation(db_err.code().as_deref(), db_err.constraint()) {
            return api;
        }
    }
    ApiError::Internal(e)
}

fn association_violation(code: Option<&str>, constraint: Option<&str>) -> Option<ApiError> {
    match code {
        // foreign_key_violation
        Some("23503") => match constraint {
            Some(c) if c.contains("tag") => Some(ApiError::validation("invalid tag id")),
            Some(c) if c.contains("ingredient") => {
                Some(ApiError::validation("invalid ingredient id"))
            }
            _ => Some(ApiError::validation("invalid id reference")),
        },
        // unique_violation
        Some("23505") => Some(ApiError::validation("duplicate id reference")),
        _ => None,
    }
}

// --- tags ---

#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(Tag::list_by_user(&state.db, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AttrBody>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let name = require_name(&body.name)?;
    // owner is always the caller, never taken from the payload
    let tag = Tag::create(&state.db, user_id, name).await?;
    info!(tag_id = %tag.id, %user_id, "tag created");
    Ok((StatusCode::CREATED, Json(tag)))
}

#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Tag>, ApiError> {
    let tag = Tag::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("tag"))?;
    Ok(Json(tag))
}

#[instrument(skip(state, body))]
pub async fn update_tag(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AttrBody>,
) -> Result<Json<Tag>, ApiError> {
    let name = require_name(&body.name)?;
    let tag = Tag::rename(&state.db, id, name)
        .await?
        .ok_or(ApiError::NotFound("tag"))?;
    Ok(Json(tag))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Tag::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("tag"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- ingredients ---

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    Ok(Json(Ingredient::list_by_user(&state.db, user_id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<AttrBody>,
) -> Result<(StatusCode, Json<Ingredient>), ApiError> {
    let name = require_name(&body.name)?;
    let ingredient = Ingredient::create(&state.db, user_id, name).await?;
    info!(ingredient_id = %ingredient.id, %user_id, "ingredient created");
    Ok((StatusCode::CREATED, Json(ingredient)))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ingredient>, ApiError> {
    let ingredient = Ingredient::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("ingredient"))?;
    Ok(Json(ingredient))
}

#[instrument(skip(state, body))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AttrBody>,
) -> Result<Json<Ingredient>, ApiError> {
    let name = require_name(&body.name)?;
    let ingredient = Ingredient::rename(&state.db, id, name)
        .await?
        .ok_or(ApiError::NotFound("ingredient"))?;
    Ok(Json(ingredient))
}

#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Ingredient::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("ingredient"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- recipes ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let recipes = Recipe::list_by_user(&state.db, user_id).await?;
    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();

    let mut tags_by_recipe: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (recipe_id, tag_id) in Recipe::tag_links(&state.db, &ids).await? {
        tags_by_recipe.entry(recipe_id).or_default().push(tag_id);
    }
    let mut ingredients_by_recipe: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (recipe_id, ingredient_id) in Recipe::ingredient_links(&state.db, &ids).await? {
        ingredients_by_recipe
            .entry(recipe_id)
            .or_default()
            .push(ingredient_id);
    }

    let items = recipes
        .into_iter()
        .map(|r| {
            let tags = tags_by_recipe.remove(&r.id).unwrap_or_default();
            let ingredients = ingredients_by_recipe.remove(&r.id).unwrap_or_default();
            RecipeSummary::new(r, tags, ingredients)
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<RecipeBody>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    require_name(&body.title).map_err(|_| ApiError::validation("title must not be empty"))?;

    let fields = RecipeFields {
        title: body.title,
        time_minutes: body.time_minutes,
        price: body.price,
        link: body.link,
    };
    let recipe = Recipe::create(&state.db, user_id, &fields, &body.tags, &body.ingredients)
        .await
        .map_err(bad_association)?;

    info!(recipe_id = %recipe.id, %user_id, "recipe created");
    Ok((
        StatusCode::CREATED,
        Json(RecipeSummary::new(recipe, body.tags, body.ingredients)),
    ))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetails>, ApiError> {
    let recipe = Recipe::find_for_user(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("recipe"))?;

    let tags = Recipe::tags(&state.db, recipe.id).await?;
    let ingredients = Recipe::ingredients(&state.db, recipe.id).await?;
    Ok(Json(RecipeDetails::new(recipe, tags, ingredients)))
}

#[instrument(skip(state, patch))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<RecipePatch>,
) -> Result<Json<RecipeSummary>, ApiError> {
    let mut recipe = Recipe::find_for_user(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("recipe"))?;

    if let Some(title) = patch.title {
        require_name(&title).map_err(|_| ApiError::validation("title must not be empty"))?;
        recipe.title = title;
    }
    if let Some(time_minutes) = patch.time_minutes {
        recipe.time_minutes = time_minutes;
    }
    if let Some(price) = patch.price {
        recipe.price = price;
    }
    if let Some(link) = patch.link {
        recipe.link = link;
    }

    let fields = RecipeFields {
        title: recipe.title.clone(),
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link.clone(),
    };
    Recipe::update(
        &state.db,
        recipe.id,
        &fields,
        patch.tags.as_deref(),
        patch.ingredients.as_deref(),
    )
    .await
    .map_err(bad_association)?;

    let tags = Recipe::tags(&state.db, recipe.id)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    let ingredients = Recipe::ingredients(&state.db, recipe.id)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();

    info!(recipe_id = %recipe.id, %user_id, "recipe updated");
    Ok(Json(RecipeSummary::new(recipe, tags, ingredients)))
}

#[instrument(skip(state, body))]
pub async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RecipeBody>,
) -> Result<Json<RecipeSummary>, ApiError> {
    let mut recipe = Recipe::find_for_user(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound("recipe"))?;

    require_name(&body.title).map_err(|_| ApiError::validation("title must not be empty"))?;

    let fields = RecipeFields {
        title: body.title,
        time_minutes: body.time_minutes,
        price: body.price,
        link: body.link,
    };
    Recipe::update(
        &state.db,
        recipe.id,
        &fields,
        Some(&body.tags),
        Some(&body.ingredients),
    )
    .await
    .map_err(bad_association)?;

    recipe.title = fields.title;
    recipe.time_minutes = fields.time_minutes;
    recipe.price = fields.price;
    recipe.link = fields.link;

    info!(recipe_id = %recipe.id, %user_id, "recipe replaced");
    Ok(Json(RecipeSummary::new(recipe, body.tags, body.ingredients)))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Recipe::delete_for_user(&state.db, user_id, id).await? {
        return Err(ApiError::NotFound("recipe"));
    }
    info!(recipe_id = %id, %user_id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_association_ids_are_client_errors() {
        let e = association_violation(Some("23503"), Some("recipe_tags_tag_id_fkey")).unwrap();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "invalid tag id");

        let e =
            association_violation(Some("23503"), Some("recipe_ingredients_ingredient_id_fkey"))
                .unwrap();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.to_string(), "invalid ingredient id");

        let e = association_violation(Some("23505"), None).unwrap();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_database_errors_stay_internal() {
        assert!(association_violation(Some("40001"), None).is_none());
        assert!(association_violation(None, None).is_none());

        let mapped = bad_association(anyhow::anyhow!("connection reset"));
        assert_eq!(mapped.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
