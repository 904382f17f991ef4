//! Canonical recipe input and boundary normalization.
//!
//! Recipe JSON arrives in several loosely-typed shapes (steps as strings or
//! objects, ingredients as "2 cups flour" or structured maps, durations as
//! minutes or free text). [`RawRecipe`] accepts all of them and
//! [`RawRecipe::normalize`] turns them into a validated [`RecipeInput`] once,
//! so nothing downstream has to inspect shapes again.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

/// Maximum number of steps a recipe may carry into generation.
pub const MAX_RECIPE_STEPS: usize = 15;

/// Units recognised when splitting free-text ingredient lines.
const KNOWN_UNITS: &[&str] = &[
    "cup", "cups", "tbsp", "tablespoon", "tablespoons", "tsp", "teaspoon", "teaspoons", "g",
    "gram", "grams", "kg", "ml", "l", "liter", "liters", "oz", "ounce", "ounces", "lb", "lbs",
    "pound", "pounds", "pinch", "clove", "cloves", "can", "cans", "slice", "slices", "bunch",
    "handful",
];

/// Unique identifier for a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(pub String);

impl RecipeId {
    /// Stable ID for a recipe that arrived without one, derived from its dish
    /// name and step instructions so reruns land on the same media record.
    pub fn derived(dish_name: &str, steps: &[Step]) -> Self {
        let mut canonical = dish_name.trim().to_lowercase();
        for step in steps {
            canonical.push('\n');
            canonical.push_str(step.instruction.trim());
        }
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes()).to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One cooking step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

impl Step {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            duration_seconds: None,
        }
    }
}

/// One ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Ingredient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: None,
            unit: None,
        }
    }
}

/// Validated recipe handed to the generation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RecipeInput {
    pub recipe_id: RecipeId,
    #[validate(length(min = 1, max = 200))]
    pub dish_name: String,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub hero_moment: Option<String>,
    /// Hero image of the finished dish, used as the source for the final video
    #[serde(default)]
    pub source_image_url: Option<String>,
    #[validate(length(max = 15))]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

impl RecipeInput {
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.instruction.as_str())
    }

    pub fn ingredient_names(&self) -> impl Iterator<Item = &str> {
        self.ingredients.iter().map(|i| i.name.as_str())
    }
}

/// Errors raised while normalizing recipe input.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe has no dish name")]
    MissingDishName,

    #[error("Invalid recipe: {0}")]
    Invalid(String),

    #[error("Failed to parse recipe JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recipe as read from an external source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecipe {
    #[serde(default, alias = "recipeId", alias = "recipe_id")]
    pub id: Option<String>,
    #[serde(default, alias = "name", alias = "dishName", alias = "dish_name")]
    pub title: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default, alias = "heroMoment")]
    pub hero_moment: Option<String>,
    #[serde(
        default,
        alias = "imageUrl",
        alias = "sourceImageUrl",
        alias = "source_image_url"
    )]
    pub image_url: Option<String>,
    #[serde(default, alias = "instructions")]
    pub steps: Vec<RawStep>,
    #[serde(default)]
    pub ingredients: Vec<RawIngredient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawStep {
    Text(String),
    Detailed {
        #[serde(alias = "text", alias = "description", alias = "step")]
        instruction: String,
        #[serde(default, alias = "durationSeconds")]
        duration_seconds: Option<u32>,
        #[serde(default, alias = "time", alias = "durationMinutes")]
        duration: Option<RawDuration>,
    },
}

/// Free-form duration: a bare number of minutes or text like "5 minutes".
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Minutes(f64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawIngredient {
    Text(String),
    Detailed {
        #[serde(alias = "item")]
        name: String,
        #[serde(default, alias = "quantity")]
        amount: Option<RawAmount>,
        #[serde(default)]
        unit: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawRecipe {
    /// Parse raw recipe JSON.
    pub fn from_json(json: &str) -> Result<Self, RecipeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Normalize into a validated [`RecipeInput`].
    ///
    /// Blank steps and ingredients are dropped and the step list is capped at
    /// [`MAX_RECIPE_STEPS`].
    pub fn normalize(self) -> Result<RecipeInput, RecipeError> {
        let dish_name = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RecipeError::MissingDishName)?;

        let steps: Vec<Step> = self
            .steps
            .into_iter()
            .filter_map(RawStep::into_step)
            .take(MAX_RECIPE_STEPS)
            .collect();

        let ingredients = self
            .ingredients
            .into_iter()
            .filter_map(RawIngredient::into_ingredient)
            .collect();

        let recipe_id = match self.id.filter(|id| !id.trim().is_empty()) {
            Some(id) => RecipeId::from_string(id),
            None => RecipeId::derived(&dish_name, &steps),
        };

        let input = RecipeInput {
            recipe_id,
            dish_name,
            cuisine: non_blank(self.cuisine),
            hero_moment: non_blank(self.hero_moment),
            source_image_url: non_blank(self.image_url),
            steps,
            ingredients,
        };

        input
            .validate()
            .map_err(|e| RecipeError::Invalid(e.to_string()))?;

        Ok(input)
    }
}

impl RawStep {
    fn into_step(self) -> Option<Step> {
        let (instruction, duration_seconds) = match self {
            RawStep::Text(text) => (text, None),
            RawStep::Detailed {
                instruction,
                duration_seconds,
                duration,
            } => (
                instruction,
                duration_seconds.or_else(|| duration.and_then(|d| d.to_seconds())),
            ),
        };

        let instruction = instruction.trim();
        if instruction.is_empty() {
            return None;
        }

        Some(Step {
            instruction: instruction.to_string(),
            duration_seconds,
        })
    }
}

impl RawDuration {
    /// Convert to whole seconds. Ranges like "10-15 minutes" use the lower bound.
    pub fn to_seconds(&self) -> Option<u32> {
        match self {
            RawDuration::Minutes(m) if *m >= 0.0 => Some((m * 60.0).round() as u32),
            RawDuration::Minutes(_) => None,
            RawDuration::Text(text) => parse_duration_text(text),
        }
    }
}

fn parse_duration_text(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    let number: String = lower
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = number.parse().ok()?;

    let multiplier = if lower.contains("hour") || lower.contains("hr") {
        3600.0
    } else if lower.contains("sec") {
        1.0
    } else {
        60.0
    };

    Some((value * multiplier).round() as u32)
}

impl RawIngredient {
    fn into_ingredient(self) -> Option<Ingredient> {
        match self {
            RawIngredient::Text(line) => parse_ingredient_line(&line),
            RawIngredient::Detailed { name, amount, unit } => {
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some(Ingredient {
                    name: name.to_string(),
                    amount: amount.and_then(RawAmount::into_string),
                    unit: non_blank(unit),
                })
            }
        }
    }
}

impl RawAmount {
    fn into_string(self) -> Option<String> {
        match self {
            RawAmount::Number(n) if n.fract() == 0.0 => Some(format!("{}", n as i64)),
            RawAmount::Number(n) => Some(n.to_string()),
            RawAmount::Text(t) => non_blank(Some(t)),
        }
    }
}

/// Split "2 cups flour" into amount, unit and name.
fn parse_ingredient_line(line: &str) -> Option<Ingredient> {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let is_amount = |t: &str| {
        t.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '/' | '.' | '-' | '½' | '¼' | '¾'))
    };

    let amount = if tokens.len() > 1 && is_amount(tokens[0]) {
        Some(tokens.remove(0).to_string())
    } else {
        None
    };

    let unit = if amount.is_some()
        && tokens.len() > 1
        && KNOWN_UNITS.contains(&tokens[0].to_lowercase().trim_end_matches('.'))
    {
        Some(tokens.remove(0).to_string())
    } else {
        None
    };

    let name = tokens.join(" ");
    if name.is_empty() {
        return None;
    }

    Some(Ingredient { name, amount, unit })
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mixed_shapes() {
        let json = r#"{
            "recipeId": "r-42",
            "dishName": "Shakshuka",
            "cuisine": "Middle Eastern",
            "imageUrl": "https://example.com/hero.jpg",
            "instructions": [
                "Heat the oil in a pan",
                {"text": "Simmer the tomatoes", "time": "10-15 minutes"},
                {"instruction": "Crack in the eggs", "durationSeconds": 240},
                "   "
            ],
            "ingredients": [
                "2 cups crushed tomatoes",
                {"item": "eggs", "quantity": 4},
                "salt"
            ]
        }"#;

        let input = RawRecipe::from_json(json).unwrap().normalize().unwrap();

        assert_eq!(input.recipe_id.as_str(), "r-42");
        assert_eq!(input.dish_name, "Shakshuka");
        assert_eq!(input.steps.len(), 3);
        assert_eq!(input.steps[1].duration_seconds, Some(600));
        assert_eq!(input.steps[2].duration_seconds, Some(240));

        assert_eq!(input.ingredients[0].amount.as_deref(), Some("2"));
        assert_eq!(input.ingredients[0].unit.as_deref(), Some("cups"));
        assert_eq!(input.ingredients[0].name, "crushed tomatoes");
        assert_eq!(input.ingredients[1].amount.as_deref(), Some("4"));
        assert_eq!(input.ingredients[2], Ingredient::named("salt"));
    }

    #[test]
    fn test_missing_id_derived_from_content() {
        let json = r#"{"title": "Dal", "steps": ["Rinse the lentils", "Simmer"]}"#;

        let first = RawRecipe::from_json(json).unwrap().normalize().unwrap();
        let second = RawRecipe::from_json(json).unwrap().normalize().unwrap();
        assert_eq!(first.recipe_id, second.recipe_id);

        let other = RawRecipe::from_json(r#"{"title": "Dal", "steps": ["Simmer"]}"#)
            .unwrap()
            .normalize()
            .unwrap();
        assert_ne!(first.recipe_id, other.recipe_id);
    }

    #[test]
    fn test_missing_dish_name_rejected() {
        let raw = RawRecipe::from_json(r#"{"title": "  ", "steps": ["Boil"]}"#).unwrap();
        assert!(matches!(raw.normalize(), Err(RecipeError::MissingDishName)));
    }

    #[test]
    fn test_steps_capped() {
        let steps: Vec<String> = (0..20).map(|i| format!("\"Step {i}\"")).collect();
        let json = format!(r#"{{"title": "Stew", "steps": [{}]}}"#, steps.join(","));
        let input = RawRecipe::from_json(&json).unwrap().normalize().unwrap();
        assert_eq!(input.steps.len(), MAX_RECIPE_STEPS);
        assert_eq!(input.steps[14].instruction, "Step 14");
    }

    #[test]
    fn test_validation_rejects_too_many_steps() {
        let input = RecipeInput {
            recipe_id: RecipeId::from_string("r"),
            dish_name: "Soup".to_string(),
            cuisine: None,
            hero_moment: None,
            source_image_url: None,
            steps: (0..16).map(|i| Step::new(format!("s{i}"))).collect(),
            ingredients: vec![],
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_duration_text() {
        assert_eq!(parse_duration_text("5 minutes"), Some(300));
        assert_eq!(parse_duration_text("1 hour"), Some(3600));
        assert_eq!(parse_duration_text("30 sec"), Some(30));
        assert_eq!(parse_duration_text("until golden"), None);
        assert_eq!(RawDuration::Minutes(2.5).to_seconds(), Some(150));
    }
}
