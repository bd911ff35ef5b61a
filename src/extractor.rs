//! Meal feature extraction
//!
//! Reduces a meal's item list into a [`NutrientSnapshot`]: macro totals, the
//! carbohydrate-weighted glycemic index, insulin-index adjusted glycemic load,
//! liquid share, and name-pattern flags (dairy, spice, alcohol, caffeine...).
//!
//! Unresolvable items contribute nothing; extraction never fails.

use std::sync::LazyLock;

use regex::Regex;

use crate::factors::food::insulin_index;
use crate::lookup::NutrientLookup;
use crate::types::{
    round1, AlcoholStrength, FoodForm, FoodTemperature, InsulinogenicType, Meal, MealItem,
    NutrientSnapshot, Product, ProductForm, ProteinType,
};

/// Glycemic index assumed for items without one, and for carb-free meals
pub const NEUTRAL_GI: f64 = 50.0;

/// Share of liquid kcal above which a meal counts as liquid
const HAS_LIQUID_RATIO: f64 = 0.5;

/// Share of liquid kcal above which the whole meal's form is liquid
const LIQUID_FORM_RATIO: f64 = 0.7;

/// Cap on the insulin-index boost, as a multiple of the item's own GL
const MAX_GL_BOOST: f64 = 2.0;

// Name patterns. Stored as Option so a bad pattern degrades to "no match".

static LIQUID_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)молоко|кефир|йогурт|ряженка|смузи|сок|коктейль|бульон|суп-пюре|протеин|shake|milk|juice|smoothie|broth|soda|cola|lemonade|лимонад",
    )
    .ok()
});

// Fermented dairy and protein drinks are liquid but not penalized
static HEALTHY_LIQUID_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)кефир|ряженка|простокваш|айран|протеин|kefir|ayran|whey|protein shake|protein drink")
        .ok()
});

static LIQUID_DAIRY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)молоко|кефир|ряженка|простокваш|айран|milk|kefir|ayran").ok()
});

static SOFT_DAIRY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)творог|йогурт|сметан|cottage|yogh?urt|quark|skyr|sour cream").ok()
});

static HARD_DAIRY_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)сыр\b|сыр |cheese|parmesan|cheddar|mozzarella").ok());

static PURE_PROTEIN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)протеин|изолят|казеин|whey|isolate|casein|protein powder").ok()
});

static HIGH_FIBER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)отруб|клетчатк|псиллиум|bran|psyllium").ok());

static SPICY_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)перец|чили|острый|карри|табаско|халапеньо|васаби|горчиц|хрен|сальса|wasabi|sriracha|salsa|pepper|spicy|chili|jalapeno|tabasco|curry|mustard|horseradish",
    )
    .ok()
});

static STRONG_ALCOHOL_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)водка|виски|коньяк|\bром\b|джин|текила|vodka|whisk|cognac|brandy|\brum\b|\bgin\b|tequila",
    )
    .ok()
});

static MEDIUM_ALCOHOL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)вино|шампанск|\bwine\b|champagne|prosecco").ok());

static WEAK_ALCOHOL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)пиво|сидр|\bbeer\b|\bcider\b|\blager\b").ok());

static CAFFEINE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)кофе|эспрессо|капучино|латте|американо|\bчай\b|матча|энергет|coffee|espresso|cappuccino|latte|americano|\btea\b|matcha|energy drink",
    )
    .ok()
});

static RESISTANT_STARCH_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)охлажд.*(карто|рис)|холодн.*(карто|рис)|салат.*карто|банан.*зел|суши|ролл|cold.*(potato|rice)|chilled.*(potato|rice)|potato salad|green banana|sushi",
    )
    .ok()
});

static HOT_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)суп|борщ|горяч|каша|рагу|жарен|варен|тушен|запечен|гриль|soup|\bhot\b|porridge|stew|fried|boiled|baked|grill|roast",
    )
    .ok()
});

static COLD_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)холодн|мороженое|смузи|салат|окрошка|гаспачо|охлажд|\bcold\b|ice cream|smoothie|salad|gazpacho|iced|chilled",
    )
    .ok()
});

static WHEY_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)протеин|сыворот|изолят|whey|isolate").ok());

static PLANT_PROTEIN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)тофу|соя|соев|фасол|чечевиц|\bнут\b|горох|tofu|\bsoy|bean|lentil|chickpea|\bpeas?\b|tempeh|seitan",
    )
    .ok()
});

static ANIMAL_PROTEIN_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)мяс|говяд|свин|кур|индейк|рыб|лосос|тунец|яйц|творог|сыр|молок|beef|pork|chicken|turkey|fish|salmon|tuna|\beggs?\b|meat|cheese|milk|steak",
    )
    .ok()
});

fn matches(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

/// Whether a product counts as a (penalized) liquid
pub fn is_penalized_liquid(text: &str) -> bool {
    matches(&LIQUID_PATTERN, text) && !matches(&HEALTHY_LIQUID_PATTERN, text)
}

/// Classify an item's insulinogenic type from its name/category text
pub fn insulinogenic_type(text: &str) -> Option<InsulinogenicType> {
    if matches(&LIQUID_DAIRY_PATTERN, text) {
        Some(InsulinogenicType::LiquidDairy)
    } else if matches(&SOFT_DAIRY_PATTERN, text) {
        Some(InsulinogenicType::SoftDairy)
    } else if matches(&PURE_PROTEIN_PATTERN, text) {
        Some(InsulinogenicType::PureProtein)
    } else if matches(&HARD_DAIRY_PATTERN, text) {
        Some(InsulinogenicType::HardDairy)
    } else if matches(&HIGH_FIBER_PATTERN, text) {
        Some(InsulinogenicType::HighFiber)
    } else {
        None
    }
}

/// Insulinogenic bonus used to rank competing item types
fn insulinogenic_rank(kind: InsulinogenicType) -> f64 {
    match kind {
        InsulinogenicType::LiquidDairy => 0.15,
        InsulinogenicType::SoftDairy => 0.10,
        InsulinogenicType::PureProtein => 0.08,
        InsulinogenicType::HardDairy => 0.05,
        InsulinogenicType::HighFiber => 0.0,
    }
}

/// Alcohol class and its wave bonus
pub fn alcohol_class(text: &str) -> Option<(AlcoholStrength, f64)> {
    if matches(&STRONG_ALCOHOL_PATTERN, text) {
        Some((AlcoholStrength::Strong, 0.25))
    } else if matches(&MEDIUM_ALCOHOL_PATTERN, text) {
        Some((AlcoholStrength::Medium, 0.18))
    } else if matches(&WEAK_ALCOHOL_PATTERN, text) {
        Some((AlcoholStrength::Weak, 0.10))
    } else {
        None
    }
}

/// Running totals while walking a meal's items
#[derive(Default)]
struct Accumulator {
    grams: f64,
    protein: f64,
    carbs: f64,
    simple: f64,
    fat: f64,
    trans_fat: f64,
    fiber: f64,
    kcal: f64,
    weighted_gi: f64,
    adjusted_gl: f64,
    liquid_kcal: f64,
    whole_kcal: f64,
    processed_kcal: f64,
    harm_weighted: f64,
    harm_kcal: f64,
    insulinogenic: Option<InsulinogenicType>,
    high_fiber_seen: bool,
    spicy: bool,
    alcohol: Option<(AlcoholStrength, f64)>,
    caffeine: bool,
    resistant_starch: bool,
    hot: bool,
    cold: bool,
    whey: bool,
    plant: bool,
    animal: bool,
    resolved: usize,
    unresolved: usize,
}

/// Meal feature extractor
pub struct MealFeatureExtractor;

impl MealFeatureExtractor {
    /// Extract the nutrient snapshot of a meal
    pub fn extract(meal: &Meal, lookup: &dyn NutrientLookup) -> NutrientSnapshot {
        Self::extract_items(&meal.items, lookup)
    }

    /// Extract the nutrient snapshot of an item list
    pub fn extract_items(items: &[MealItem], lookup: &dyn NutrientLookup) -> NutrientSnapshot {
        let mut acc = Accumulator::default();

        for item in items {
            let product = lookup.resolve_item(item).or(item.snapshot.as_ref());
            match product {
                Some(product) => {
                    acc.resolved += 1;
                    Self::accumulate(&mut acc, item, product);
                }
                None => acc.unresolved += 1,
            }
        }

        Self::finish(acc)
    }

    fn accumulate(acc: &mut Accumulator, item: &MealItem, product: &Product) {
        let grams = item.grams_or_default();
        let factor = grams / 100.0;

        let name = if product.name.is_empty() {
            item.name.as_deref().unwrap_or("")
        } else {
            product.name.as_str()
        };
        let text = match &product.category {
            Some(category) => format!("{} {}", name, category).to_lowercase(),
            None => name.to_lowercase(),
        };

        let carbs = product.carbs_per_100() * factor;
        let simple = product.simple100.max(0.0) * factor;
        let protein = product.protein100.max(0.0) * factor;
        let kcal = product.kcal_per_100() * factor;
        let gi = product
            .gi
            .filter(|gi| gi.is_finite() && *gi >= 0.0)
            .unwrap_or(NEUTRAL_GI);

        acc.grams += grams;
        acc.protein += protein;
        acc.carbs += carbs;
        acc.simple += simple.min(carbs);
        acc.fat += product.fat_per_100().max(0.0) * factor;
        acc.trans_fat += product.trans100.max(0.0) * factor;
        acc.fiber += product.fiber100.max(0.0) * factor;
        acc.kcal += kcal;

        // GI is weighted by carbohydrate, not by mass
        acc.weighted_gi += gi * carbs;

        let kind = insulinogenic_type(&text);
        let item_gl = gi * carbs / 100.0;
        let boost = insulin_index(kind).gl_boost;
        let boosted = (item_gl * boost).min(item_gl * (1.0 + MAX_GL_BOOST));
        acc.adjusted_gl += boosted.max(0.0);

        match kind {
            Some(InsulinogenicType::HighFiber) => acc.high_fiber_seen = true,
            Some(kind) => {
                let current = acc.insulinogenic.map(insulinogenic_rank).unwrap_or(0.0);
                if insulinogenic_rank(kind) > current {
                    acc.insulinogenic = Some(kind);
                }
            }
            None => {}
        }

        if is_penalized_liquid(&text) {
            acc.liquid_kcal += kcal;
        }
        match product.form {
            Some(ProductForm::Whole) => acc.whole_kcal += kcal,
            Some(ProductForm::Processed) => acc.processed_kcal += kcal,
            None => {}
        }
        if let Some(harm) = product.harm.filter(|h| h.is_finite()) {
            acc.harm_weighted += harm * kcal;
            acc.harm_kcal += kcal;
        }

        acc.spicy |= matches(&SPICY_PATTERN, &text);
        acc.caffeine |= matches(&CAFFEINE_PATTERN, &text);
        acc.resistant_starch |= matches(&RESISTANT_STARCH_PATTERN, &text);
        acc.hot |= matches(&HOT_PATTERN, &text);
        acc.cold |= matches(&COLD_PATTERN, &text);

        if let Some((strength, bonus)) = alcohol_class(&text) {
            if acc.alcohol.map_or(true, |(_, current)| bonus > current) {
                acc.alcohol = Some((strength, bonus));
            }
        }

        if protein > 0.0 {
            acc.whey |= matches(&WHEY_PATTERN, &text);
            acc.plant |= matches(&PLANT_PROTEIN_PATTERN, &text);
            acc.animal |= matches(&ANIMAL_PROTEIN_PATTERN, &text);
        }
    }

    fn finish(acc: Accumulator) -> NutrientSnapshot {
        let avg_gi = if acc.carbs > 0.0 {
            (acc.weighted_gi / acc.carbs).round()
        } else {
            NEUTRAL_GI
        };

        let liquid_ratio = ratio(acc.liquid_kcal, acc.kcal);
        let food_form = if liquid_ratio > LIQUID_FORM_RATIO {
            FoodForm::Liquid
        } else if ratio(acc.whole_kcal, acc.kcal) > 0.5 {
            FoodForm::Whole
        } else if ratio(acc.processed_kcal, acc.kcal) > 0.5 {
            FoodForm::Processed
        } else {
            FoodForm::Mixed
        };

        let temperature = match (acc.hot, acc.cold) {
            (true, false) => FoodTemperature::Hot,
            (false, true) => FoodTemperature::Cold,
            _ => FoodTemperature::Room,
        };

        let protein_type = if acc.whey {
            ProteinType::Whey
        } else if acc.plant {
            ProteinType::Plant
        } else if acc.animal {
            ProteinType::Animal
        } else {
            ProteinType::Mixed
        };

        let insulinogenic = acc.insulinogenic.or(if acc.high_fiber_seen {
            Some(InsulinogenicType::HighFiber)
        } else {
            None
        });

        let carbs = round1(acc.carbs);
        let simple = round1(acc.simple);

        NutrientSnapshot {
            grams: round1(acc.grams),
            protein: round1(acc.protein),
            carbs,
            simple,
            complex: round1((acc.carbs - acc.simple).max(0.0)),
            fat: round1(acc.fat),
            trans_fat: round1(acc.trans_fat),
            fiber: round1(acc.fiber),
            kcal: acc.kcal.round(),
            avg_gi,
            glycemic_load: non_negative(round1(acc.adjusted_gl)),
            base_glycemic_load: non_negative(round1(avg_gi * acc.carbs / 100.0)),
            liquid_ratio: (liquid_ratio * 100.0).round() / 100.0,
            has_liquid: liquid_ratio > HAS_LIQUID_RATIO,
            simple_ratio: ((ratio(acc.simple, acc.carbs)) * 100.0).round() / 100.0,
            insulinogenic,
            protein_type,
            spicy: acc.spicy,
            alcohol: acc.alcohol.map(|(strength, _)| strength),
            alcohol_bonus: acc.alcohol.map_or(0.0, |(_, bonus)| bonus),
            caffeine: acc.caffeine,
            resistant_starch: acc.resistant_starch,
            temperature,
            food_form,
            harm: if acc.harm_kcal > 0.0 {
                Some(round1(acc.harm_weighted / acc.harm_kcal))
            } else {
                None
            },
            resolved_items: acc.resolved,
            unresolved_items: acc.unresolved,
        }
    }
}

fn ratio(part: f64, total: f64) -> f64 {
    if total > 0.0 && part.is_finite() {
        (part / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
