use std::time::Duration;

pub(crate) const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_SUBTITLE_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) const PERSONA_TEMPLATE: &str = "You are playing the role of {role} in a spoken mock conversation about {topic}. \
Stay in character for the whole conversation and speak only {language}. \
Keep every reply short and natural, the way people talk out loud, and ask one question at a time so the user keeps practicing. \
Never mention that you are an AI or that this is an exercise. \
If the user wants to stop, or the conversation reaches a natural end, say a brief farewell.";

pub(crate) const START_KICKOFF: &str =
    "Start the conversation with a brief greeting and introduce the topic.";

pub(crate) const START_INSTRUCTION: &str =
    r#"You MUST respond in JSON with: {"reply": "your greeting"}."#;
pub(crate) const START_INSTRUCTION_SUBTITLED: &str = r#"You MUST respond in JSON with: {"reply": "your greeting", "replySubtitle": "translation of your greeting in {subtitle}"}."#;

pub(crate) const ANSWER_INSTRUCTION: &str = r#"You MUST respond in JSON with: {"reply": "your reply", "isConversationEnding": false}. Set isConversationEnding to true only when the conversation is ending (the user says goodbye or you decide to end it). When it is true, reply with a natural farewell."#;
pub(crate) const ANSWER_INSTRUCTION_SUBTITLED: &str = r#"You MUST respond in JSON with: {"reply": "your reply", "replySubtitle": "translation of your reply in {subtitle}", "isConversationEnding": false}. Set isConversationEnding to true only when the conversation is ending (the user says goodbye or you decide to end it). When it is true, reply with a natural farewell."#;
pub(crate) const ANSWER_INSTRUCTION_ECHO: &str = r#"You MUST respond in JSON with: {"userTranscriptEcho": "the user's last message, word for word", "userTranscriptSubtitle": "translation of the user's last message in {subtitle}", "reply": "your reply", "replySubtitle": "translation of your reply in {subtitle}", "isConversationEnding": false}. Set isConversationEnding to true only when the conversation is ending (the user says goodbye or you decide to end it). When it is true, reply with a natural farewell."#;

pub(crate) const END_INSTRUCTION: &str = r#"The user has decided to end the conversation. You MUST respond in JSON with: {"reply": "your farewell"}. Provide a natural farewell message."#;
pub(crate) const END_INSTRUCTION_SUBTITLED: &str = r#"The user has decided to end the conversation. You MUST respond in JSON with: {"reply": "your farewell", "replySubtitle": "translation of your farewell in {subtitle}"}. Provide a natural farewell message."#;

pub(crate) const TRANSLATE_INSTRUCTION: &str = "Translate the user's message into {subtitle}. Respond with the translation only, without quotes or commentary.";
