//! Prompt builder.
//!
//! Pure and deterministic: the same recipe always yields the same prompt.
//! Keyword tables map cooking techniques, ingredients and cuisines to visual
//! phrases which are stitched into a fixed template and capped at
//! [`MAX_PROMPT_CHARS`].

use platecast_models::{AspectRatio, RecipeInput};

/// Character budget for every generated prompt.
pub const MAX_PROMPT_CHARS: usize = 500;

const MAX_TECHNIQUES: usize = 3;
const MAX_COLOURS: usize = 3;

// =============================================================================
// Keyword Tables
// =============================================================================

/// Technique keyword → visual. Matched as lowercase substrings.
const TECHNIQUE_VISUALS: &[(&str, &str)] = &[
    ("sear", "a hard sear building a deep golden crust"),
    ("saute", "ingredients tossed mid-air over a glossy pan"),
    ("sauté", "ingredients tossed mid-air over a glossy pan"),
    ("fry", "bubbling oil and crisp golden edges"),
    ("boil", "a rolling boil with rising steam"),
    ("simmer", "a gentle simmer with lazy bubbles"),
    ("bake", "warm oven glow over a puffed golden surface"),
    ("roast", "caramelized roasted edges"),
    ("grill", "charred grill marks and wisps of smoke"),
    ("whisk", "a whisk blurring through glossy batter"),
    ("knead", "hands folding soft dough on a floured board"),
    ("chop", "a sharp knife mid-chop on a wooden board"),
    ("dice", "neat diced cubes sliding off a knife"),
    ("slice", "thin slices fanning across the board"),
    ("stir", "a wooden spoon swirling through a thick sauce"),
    ("pour", "a slow ribbon pour"),
    ("drizzle", "a fine drizzle catching the light"),
    ("garnish", "fresh herbs scattered as a final garnish"),
    ("steam", "soft clouds of steam"),
    ("blend", "a blender vortex of vivid purée"),
];

const GENERIC_TECHNIQUE: &str = "careful hands at work over a busy stovetop";

/// Ingredient keyword → colour.
const INGREDIENT_COLOURS: &[(&str, &str)] = &[
    ("tomato", "bright red"),
    ("chili", "fiery red"),
    ("paprika", "smoky red"),
    ("basil", "vivid green"),
    ("spinach", "deep green"),
    ("avocado", "creamy green"),
    ("lime", "zesty green"),
    ("lemon", "sunny yellow"),
    ("egg", "golden yellow"),
    ("saffron", "saffron gold"),
    ("turmeric", "saffron gold"),
    ("carrot", "warm orange"),
    ("pumpkin", "warm orange"),
    ("beet", "deep magenta"),
    ("blueberr", "inky blue"),
    ("chocolate", "rich brown"),
    ("mushroom", "earthy brown"),
    ("cream", "soft ivory"),
    ("rice", "pearly white"),
];

const GENERIC_PALETTE: &str = "warm golden and earthy tones";

/// Cuisine keyword → styling.
const CUISINE_STYLES: &[(&str, &str)] = &[
    ("italian", "rustic Italian trattoria styling with linen and olive wood"),
    ("japanese", "minimal Japanese plating on dark ceramics"),
    ("mexican", "vibrant Mexican styling with terracotta and fresh lime"),
    ("indian", "rich Indian styling with copper bowls and spice tins"),
    ("french", "elegant French bistro styling with marble and brass"),
    ("thai", "fresh Thai street-food styling on banana leaf"),
    ("chinese", "Chinese home-kitchen styling around a seasoned wok"),
    ("korean", "Korean table styling with small banchan dishes"),
    ("mediterranean", "sun-washed Mediterranean styling on white stone"),
    ("american", "classic American diner styling"),
];

const GENERIC_STYLE: &str = "warm home-kitchen styling in soft natural light";

// =============================================================================
// Prompt Context
// =============================================================================

/// Everything the builder looks at.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub dish_name: &'a str,
    pub instructions: Vec<&'a str>,
    pub ingredients: Vec<&'a str>,
    pub cuisine: Option<&'a str>,
    pub hero_moment: Option<&'a str>,
    pub aspect_ratio: AspectRatio,
}

impl<'a> PromptContext<'a> {
    pub fn from_recipe(recipe: &'a RecipeInput, aspect_ratio: AspectRatio) -> Self {
        Self {
            dish_name: &recipe.dish_name,
            instructions: recipe.instructions().collect(),
            ingredients: recipe.ingredient_names().collect(),
            cuisine: recipe.cuisine.as_deref(),
            hero_moment: recipe.hero_moment.as_deref(),
            aspect_ratio,
        }
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Prompt for the composite recipe video or hero image.
pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let techniques = technique_visuals(&ctx.instructions);
    let mut segments = vec![
        format!("Cinematic food film of {}", ctx.dish_name.trim()),
        format!("Featuring {}", techniques.join(", ")),
        format!("Colour palette of {}", palette(&ctx.ingredients)),
        cuisine_style(ctx.cuisine).to_string(),
    ];
    push_hero(&mut segments, ctx.hero_moment);
    segments.push("Smooth overhead-to-45-degree camera move, shallow depth of field, soft key light".to_string());
    segments.push(constraints(ctx.aspect_ratio));
    finish(segments)
}

/// Regeneration prompt: different camera, only the lead technique.
pub fn build_alternate_prompt(ctx: &PromptContext<'_>) -> String {
    let techniques = technique_visuals(&ctx.instructions);
    let mut segments = vec![
        format!("Eye-level close-up of {}", ctx.dish_name.trim()),
        format!("Focused on {}", techniques[0]),
        format!("Colour palette of {}", palette(&ctx.ingredients)),
        cuisine_style(ctx.cuisine).to_string(),
    ];
    push_hero(&mut segments, ctx.hero_moment);
    segments.push("Slow push-in at eye level, crisp focus on texture, warm rim light".to_string());
    segments.push(constraints(ctx.aspect_ratio));
    finish(segments)
}

/// Prompt for one step of the recipe.
pub fn build_step_prompt(ctx: &PromptContext<'_>, step_index: usize, instruction: &str) -> String {
    let techniques = technique_visuals(&[instruction]);
    let segments = vec![
        format!(
            "Step {} of cooking {}: {}",
            step_index + 1,
            ctx.dish_name.trim(),
            instruction.trim()
        ),
        format!("Showing {}", techniques.join(", ")),
        format!("Colour palette of {}", palette(&ctx.ingredients)),
        cuisine_style(ctx.cuisine).to_string(),
        "Overhead view of the work surface, natural window light".to_string(),
        constraints(ctx.aspect_ratio),
    ];
    finish(segments)
}

// =============================================================================
// Helpers
// =============================================================================

/// Up to three distinct technique visuals in encounter order.
///
/// Never empty.
fn technique_visuals(instructions: &[&str]) -> Vec<&'static str> {
    let mut found: Vec<&'static str> = Vec::new();

    'outer: for instruction in instructions {
        let lower = instruction.to_lowercase();
        let mut hits: Vec<(usize, &'static str)> = TECHNIQUE_VISUALS
            .iter()
            .filter_map(|(keyword, visual)| lower.find(keyword).map(|pos| (pos, *visual)))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);

        for (_, visual) in hits {
            if !found.contains(&visual) {
                found.push(visual);
            }
            if found.len() == MAX_TECHNIQUES {
                break 'outer;
            }
        }
    }

    if found.is_empty() {
        found.push(GENERIC_TECHNIQUE);
    }
    found
}

fn palette(ingredients: &[&str]) -> String {
    let mut colours: Vec<&'static str> = Vec::new();

    for name in ingredients {
        let lower = name.to_lowercase();
        if let Some((_, colour)) = INGREDIENT_COLOURS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
        {
            if !colours.contains(colour) {
                colours.push(colour);
            }
        }
        if colours.len() == MAX_COLOURS {
            break;
        }
    }

    if colours.is_empty() {
        GENERIC_PALETTE.to_string()
    } else {
        colours.join(", ")
    }
}

fn cuisine_style(cuisine: Option<&str>) -> &'static str {
    let Some(cuisine) = cuisine else {
        return GENERIC_STYLE;
    };
    let lower = cuisine.to_lowercase();
    CUISINE_STYLES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, style)| *style)
        .unwrap_or(GENERIC_STYLE)
}

fn push_hero(segments: &mut Vec<String>, hero_moment: Option<&str>) {
    if let Some(hero) = hero_moment.map(str::trim).filter(|h| !h.is_empty()) {
        segments.push(format!("Hero moment: {}", hero));
    }
}

fn constraints(aspect_ratio: AspectRatio) -> String {
    format!(
        "{} frame, photorealistic, no text, no logos, no watermarks, no distorted hands",
        aspect_ratio.label()
    )
}

fn finish(segments: Vec<String>) -> String {
    let mut prompt = segments.join(". ");
    prompt.push('.');
    truncate_prompt(prompt)
}

/// Cap at [`MAX_PROMPT_CHARS`] characters, ending in "..." when cut.
pub fn truncate_prompt(prompt: String) -> String {
    if prompt.chars().count() <= MAX_PROMPT_CHARS {
        return prompt;
    }
    let mut cut: String = prompt.chars().take(MAX_PROMPT_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(instructions: Vec<&'a str>, ingredients: Vec<&'a str>) -> PromptContext<'a> {
        PromptContext {
            dish_name: "Shakshuka",
            instructions,
            ingredients,
            cuisine: Some("Middle Eastern / Mediterranean"),
            hero_moment: Some("eggs cracked into the bubbling sauce"),
            aspect_ratio: AspectRatio::Portrait,
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let c = ctx(
            vec!["Chop the onion", "Simmer the tomatoes", "Garnish"],
            vec!["tomatoes", "eggs", "parsley"],
        );
        assert_eq!(build_prompt(&c), build_prompt(&c));
        assert_eq!(build_alternate_prompt(&c), build_alternate_prompt(&c));
    }

    #[test]
    fn test_prompt_collects_techniques_and_palette() {
        let c = ctx(
            vec!["Chop the onion", "Simmer the tomatoes", "Garnish with parsley"],
            vec!["tomatoes", "eggs", "basil"],
        );
        let prompt = build_prompt(&c);

        assert!(prompt.starts_with("Cinematic food film of Shakshuka"));
        assert!(prompt.contains(
            "a sharp knife mid-chop on a wooden board, a gentle simmer with lazy bubbles, fresh herbs"
        ));
        assert!(prompt.contains("bright red, golden yellow, vivid green"));
        assert!(prompt.contains("Mediterranean"));
        assert!(prompt.contains("Hero moment: eggs cracked"));
        assert!(prompt.contains("9:16 frame"));
    }

    #[test]
    fn test_fallbacks() {
        let c = PromptContext {
            dish_name: "Toast",
            instructions: vec!["Assemble"],
            ingredients: vec!["bread"],
            cuisine: None,
            hero_moment: None,
            aspect_ratio: AspectRatio::Square,
        };
        let prompt = build_prompt(&c);
        assert!(prompt.contains(GENERIC_TECHNIQUE));
        assert!(prompt.contains(GENERIC_PALETTE));
        assert!(prompt.contains(GENERIC_STYLE));
        assert!(!prompt.contains("Hero moment"));
    }

    #[test]
    fn test_alternate_uses_only_lead_technique() {
        let c = ctx(vec!["Sear the steak, then roast"], vec![]);
        let alt = build_alternate_prompt(&c);
        assert!(alt.starts_with("Eye-level close-up"));
        assert!(alt.contains("hard sear"));
        assert!(!alt.contains("caramelized roasted"));
        assert_ne!(alt, build_prompt(&c));
    }

    #[test]
    fn test_techniques_capped_at_three() {
        let found = technique_visuals(&["Chop, stir, pour, then bake and grill"]);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0], "a sharp knife mid-chop on a wooden board");
    }

    #[test]
    fn test_long_prompt_truncated_to_budget() {
        let long_dish = "Grandmother's ".repeat(60);
        let c = PromptContext {
            dish_name: &long_dish,
            ..ctx(vec!["Stir"], vec!["rice"])
        };
        let prompt = build_prompt(&c);
        assert_eq!(prompt.chars().count(), MAX_PROMPT_CHARS);
        assert!(prompt.ends_with("..."));
    }

    #[test]
    fn test_truncation_is_char_safe() {
        let prompt = truncate_prompt("é".repeat(600));
        assert_eq!(prompt.chars().count(), MAX_PROMPT_CHARS);
        assert!(prompt.ends_with("..."));
    }

    #[test]
    fn test_step_prompt_scoped_to_instruction() {
        let c = ctx(vec!["Chop the onion", "Bake for 20 minutes"], vec!["onion"]);
        let prompt = build_step_prompt(&c, 1, "Bake for 20 minutes");
        assert!(prompt.starts_with("Step 2 of cooking Shakshuka: Bake for 20 minutes"));
        assert!(prompt.contains("oven glow"));
        assert!(!prompt.contains("mid-chop"));
        assert!(prompt.chars().count() <= MAX_PROMPT_CHARS);
    }
}
