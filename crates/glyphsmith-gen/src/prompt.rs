//! Prompt enhancement for image generation

/// What a generated image will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPurpose {
    AppIcon,
    TabBar,
    LaunchScreen,
}

impl PromptPurpose {
    fn suffix(self) -> &'static str {
        match self {
            PromptPurpose::AppIcon => {
                "iOS app icon style, centered design, no text, clean background, professional"
            }
            PromptPurpose::TabBar => "simple line icon, minimal detail, black and white, iOS tab bar style",
            PromptPurpose::LaunchScreen => {
                "mobile app launch screen, vertical orientation, branded background"
            }
        }
    }
}

/// Append the style guidance for `purpose` to a user prompt
pub fn enhance(prompt: &str, purpose: PromptPurpose) -> String {
    format!("{}, {}", prompt.trim(), purpose.suffix())
}
