//! Ghost persona roster.
//!
//! The registry is built once at startup and handed around behind an `Arc`;
//! nothing in the crate looks personas up through global state.

use serde::Serialize;
use tracing::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::locale::Locale;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualStyle {
    /// Theme colour, `#RRGGBB`.
    pub color: String,
    /// Emoji used when the artwork is unavailable (and on the terminal stage).
    pub icon: String,
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    pub personality: Vec<String>,
    pub speaking_style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaking_style_en: Option<String>,
    pub visual_style: VisualStyle,
}

impl Persona {
    /// English speaking style when asked for `en` and one exists, the default style otherwise.
    pub fn speaking_style_for(&self, locale: Locale) -> &str {
        match (locale, &self.speaking_style_en) {
            (Locale::En, Some(style)) => style,
            _ => &self.speaking_style,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: Vec<Persona>,
}

impl PersonaRegistry {
    pub fn new(personas: Vec<Persona>) -> Self {
        Self { personas }
    }

    /// The built-in cast: Bones the skeleton, Pump the pumpkin and Wilma the witch.
    pub fn builtin() -> Self {
        Self::new(vec![skeleton(), pumpkin(), witch()])
    }

    pub fn all(&self) -> &[Persona] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Looks up each id in order, dropping the ones that are not in the roster.
    pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Persona> {
        ids.iter()
            .filter_map(|id| {
                let found = self.get(id.as_ref().trim());
                if found.is_none() {
                    debug!(id = id.as_ref(), "Ignoring unknown persona id");
                }
                found
            })
            .collect()
    }

    /// Up to `count` distinct personas in random order.
    pub fn select_random(&self, count: usize) -> Vec<&Persona> {
        self.select_with(count, &mut rand::thread_rng())
    }

    pub fn select_with<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<&Persona> {
        self.personas.choose_multiple(rng, count).collect()
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn skeleton() -> Persona {
    Persona {
        id: "skeleton".to_string(),
        name: "ボーンズ".to_string(),
        description: "陽気で軽口を叩くスケルトン".to_string(),
        personality: strings(&["明るくて社交的", "ジョークが好き", "骨に関するダジャレを言いがち"]),
        speaking_style: "軽快で親しみやすい口調。「〜だぜ」「〜じゃん」などのカジュアルな語尾".to_string(),
        speaking_style_en: Some(
            "Casual and friendly tone. Uses contractions and informal language like \"gonna\", \"wanna\"".to_string(),
        ),
        visual_style: VisualStyle {
            color: "#E8E8E8".to_string(),
            icon: "💀".to_string(),
            image_path: "/static/characters/skeleton.svg".to_string(),
        },
    }
}

fn pumpkin() -> Persona {
    Persona {
        id: "pumpkin".to_string(),
        name: "パンプ".to_string(),
        description: "元気いっぱいで少し天然なカボチャ".to_string(),
        personality: strings(&["好奇心旺盛", "ポジティブ", "少しおっちょこちょい"]),
        speaking_style: "元気で明るい口調。「〜だよ！」「わぁ！」などの感嘆詞が多い".to_string(),
        speaking_style_en: Some(
            "Energetic and cheerful tone. Uses lots of exclamations like \"Wow!\", \"Yay!\"".to_string(),
        ),
        visual_style: VisualStyle {
            color: "#FF8C00".to_string(),
            icon: "🎃".to_string(),
            image_path: "/static/characters/pumpkin.svg".to_string(),
        },
    }
}

fn witch() -> Persona {
    Persona {
        id: "witch".to_string(),
        name: "ウィルマ".to_string(),
        description: "知的で少しミステリアスな魔女".to_string(),
        personality: strings(&["知識豊富", "落ち着いている", "時々意地悪な冗談を言う"]),
        speaking_style: "丁寧だが少し古風な口調。「〜ですわ」「〜ですもの」などの語尾".to_string(),
        speaking_style_en: Some(
            "Polite but slightly archaic tone. Uses formal language with a mysterious flair".to_string(),
        ),
        visual_style: VisualStyle {
            color: "#8B4789".to_string(),
            icon: "🧙‍♀️".to_string(),
            image_path: "/static/characters/witch.svg".to_string(),
        },
    }
}
