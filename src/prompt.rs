use crate::locale::Locale;
use crate::personas::Persona;

struct Template {
    intro: &'static str,
    situation_heading: &'static str,
    characters_heading: &'static str,
    description_label: &'static str,
    personality_label: &'static str,
    speaking_style_label: &'static str,
    rules: &'static str,
}

const JA: Template = Template {
    intro: "あなたは複数のハロウィンキャラクターの会話を生成するAIです。",
    situation_heading: "## シチュエーション",
    characters_heading: "## 登場キャラクター",
    description_label: "説明",
    personality_label: "性格",
    speaking_style_label: "話し方",
    rules: "## 会話のルール
1. 各キャラクターは自分の性格と話し方に忠実に会話してください
2. シチュエーションに基づいた自然な対話を生成してください
3. キャラクター同士が交互に話すようにしてください
4. 各発言は1-3文程度の長さにしてください
5. 合計で8-12回の発言を生成してください
6. 各発言は以下のJSON形式で出力してください：
{\"personaId\": \"キャラクターID\", \"message\": \"発言内容\"}

各発言を改行で区切って出力してください。",
};

const EN: Template = Template {
    intro: "You are an AI that generates conversations between multiple Halloween characters.",
    situation_heading: "## Situation",
    characters_heading: "## Characters",
    description_label: "Description",
    personality_label: "Personality",
    speaking_style_label: "Speaking Style",
    rules: "## Conversation Rules
1. Each character must stay true to their personality and speaking style
2. Generate natural dialogue based on the situation
3. Characters should take turns speaking
4. Keep each message to 1-3 sentences
5. Generate a total of 8-12 messages
6. Output each message in the following JSON format:
{\"personaId\": \"character_id\", \"message\": \"message_content\"}

Separate each message with a newline.",
};

fn template(locale: Locale) -> &'static Template {
    match locale {
        Locale::Ja => &JA,
        Locale::En => &EN,
    }
}

/// System prompt describing the situation, the cast and the one-JSON-object-per-line output format.
pub fn build_system_prompt(situation: &str, personas: &[&Persona], locale: Locale) -> String {
    let t = template(locale);

    let mut prompt = String::from(t.intro);
    prompt.push_str(&format!("\n\n{}\n{}", t.situation_heading, situation));
    prompt.push_str(&format!("\n\n{}", t.characters_heading));

    for persona in personas {
        prompt.push_str(&format!("\n\n### {} (ID: {})", persona.name, persona.id));
        prompt.push_str(&format!("\n- {}: {}", t.description_label, persona.description));
        prompt.push_str(&format!(
            "\n- {}: {}",
            t.personality_label,
            persona.personality.join(", ")
        ));
        prompt.push_str(&format!(
            "\n- {}: {}",
            t.speaking_style_label,
            persona.speaking_style_for(locale)
        ));
    }

    prompt.push_str("\n\n");
    prompt.push_str(t.rules);
    prompt
}

/// The fixed user turn sent alongside the system prompt.
pub fn user_instruction(locale: Locale) -> &'static str {
    match locale {
        Locale::Ja => "上記のシチュエーションとキャラクターで会話を始めてください。",
        Locale::En => "Please start the conversation with the above situation and characters.",
    }
}
