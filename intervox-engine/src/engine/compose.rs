//! Spoken-text composition
//!
//! Builds the utterance actually sent to the speech synthesizer: the first
//! question gets a greeting that names the interviewer (derived from the
//! voice id), later questions get a short acknowledgement plus a transition,
//! and submission gets a fixed closing line. Catalogs are parameterized by
//! interview language with an English fallback.
//!
//! Drawing uses a seeded PRNG so a fixed seed reproduces the same phrasing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const INTRO_QUESTIONS_EN: &[&str] = &[
    "To start, could you walk me through your professional background and the work you are most proud of?",
    "Before we dive in, how would you summarize your career so far in a couple of minutes?",
    "Let's begin with you: which strengths do you rely on most in your day-to-day work, and where are you still growing?",
];

const INTRO_QUESTIONS_VI: &[&str] = &[
    "Trước tiên, bạn có thể giới thiệu ngắn gọn về quá trình làm việc và những thành quả bạn tự hào nhất không?",
    "Trước khi bắt đầu, bạn hãy tóm tắt con đường sự nghiệp của mình trong vài phút nhé?",
    "Hãy bắt đầu từ bạn: bạn dựa vào những thế mạnh nào trong công việc hằng ngày, và bạn còn muốn phát triển thêm điều gì?",
];

const OPENER_TEMPLATES_EN: &[&str] = &[
    "Could you describe one of the most engaging projects you have worked on in {position}?",
    "What hands-on experience do you bring to the field of {position}?",
    "In your view, what are the biggest challenges professionals in {position} face today?",
    "How did you find your way into {position}?",
    "Which parts of working in {position} do you find most rewarding?",
    "Which emerging trends in {position} are you most excited about, and why?",
    "What do people commonly get wrong about working in {position}?",
    "What have you done recently to sharpen your skills in {position}?",
    "What advice would you give someone starting out in {position}?",
    "Where would you like your career in {position} to go from here?",
    "Which skills do you consider essential to succeed in {position}?",
];

const OPENER_TEMPLATES_VI: &[&str] = &[
    "Bạn có thể kể về một dự án thú vị nhất mà bạn từng tham gia trong lĩnh vực {position} không?",
    "Bạn có những kinh nghiệm thực tế nào trong lĩnh vực {position}?",
    "Theo bạn, thách thức lớn nhất với người làm {position} hiện nay là gì?",
    "Con đường nào đưa bạn đến với {position}?",
    "Điều gì trong công việc {position} khiến bạn thấy xứng đáng nhất?",
    "Xu hướng mới nào trong {position} khiến bạn hào hứng nhất, và vì sao?",
    "Mọi người thường hiểu nhầm điều gì về nghề {position}?",
    "Gần đây bạn đã làm gì để nâng cao kỹ năng trong {position}?",
    "Bạn sẽ khuyên gì cho người mới bắt đầu với {position}?",
    "Bạn muốn sự nghiệp trong {position} của mình phát triển theo hướng nào?",
    "Theo bạn, những kỹ năng nào là thiết yếu để thành công trong {position}?",
];

const ACKNOWLEDGEMENTS: &[&str] = &[
    "I see.",
    "That sounds good.",
    "Interesting.",
    "Got it.",
    "Alright.",
    "Understood.",
];

const TRANSITIONS: &[&str] = &[
    "Now, let's move on to the next question.",
    "Let's proceed to the next question.",
    "Moving on to the next question.",
    "Next question coming up.",
    "Here's the next question.",
];

const OUTRO_EN: &str = "You have successfully submitted the interview. \
You can check out the results in a few minutes. \
See you in another interview session!";

const OUTRO_VI: &str = "Bạn đã nộp bài phỏng vấn thành công. \
Kết quả sẽ có sau ít phút. Hẹn gặp lại bạn trong buổi phỏng vấn tiếp theo!";

fn is_vietnamese(language: &str) -> bool {
    language.eq_ignore_ascii_case("vietnamese") || language.eq_ignore_ascii_case("vi")
}

/// Fixed closing utterance per language.
pub fn outro_text(language: &str) -> &'static str {
    if is_vietnamese(language) {
        OUTRO_VI
    } else {
        OUTRO_EN
    }
}

/// Speaker name embedded in the greeting: the suffix of the voice id after
/// the last `.` or `-`, empty when the id has neither.
pub fn speaker_name(voice_id: &str) -> &str {
    let dot = voice_id.rfind('.');
    let dash = voice_id.rfind('-');
    match dot.into_iter().chain(dash).max() {
        Some(pos) => &voice_id[pos + 1..],
        None => "",
    }
}

/// Phrase composer with a seeded PRNG
pub struct Composer {
    rng: StdRng,
}

impl Composer {
    pub fn new() -> Self {
        Composer {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic composer; a fixed seed reproduces the same draws.
    pub fn with_seed(seed: u64) -> Self {
        Composer {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[self.rng.gen_range(0..options.len())]
    }

    /// Warm-up question asked before the technical part.
    pub fn intro_question(&mut self, language: &str) -> String {
        let catalog = if is_vietnamese(language) {
            INTRO_QUESTIONS_VI
        } else {
            INTRO_QUESTIONS_EN
        };
        self.pick(catalog).to_string()
    }

    /// Position-specific opener drawn from the built-in catalog.
    pub fn opener_question(&mut self, language: &str, position: &str) -> String {
        let catalog = if is_vietnamese(language) {
            OPENER_TEMPLATES_VI
        } else {
            OPENER_TEMPLATES_EN
        };
        self.pick(catalog).replace("{position}", position)
    }

    /// Full spoken form of a question.
    ///
    /// Index 1 is prefixed with the greeting; later indices get an
    /// acknowledgement of the previous answer plus a transition.
    pub fn spoken_form(&mut self, question_index: i32, content: &str, voice_id: &str) -> String {
        if question_index == 1 {
            let greeting = format!(
                "Thanks for joining this interview session today. I'm {}, nice to meet you. \
                 To begin with, let me ask you some questions.",
                speaker_name(voice_id)
            );
            return format!("{} {}", greeting, content);
        }
        let acknowledgement = self.pick(ACKNOWLEDGEMENTS);
        let transition = self.pick(TRANSITIONS);
        format!("{} {} {}", acknowledgement, transition, content)
    }
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_name_after_dot_or_dash() {
        assert_eq!(speaker_name("en-US.amy"), "amy");
        assert_eq!(speaker_name("en-US-amy"), "amy");
        assert_eq!(speaker_name("voices.female-mai"), "mai");
        assert_eq!(speaker_name("plainvoice"), "");
    }

    #[test]
    fn test_first_question_gets_greeting() {
        let mut composer = Composer::with_seed(1);
        let spoken = composer.spoken_form(1, "Tell me about yourself.", "en-US-amy");
        assert!(spoken.starts_with("Thanks for joining this interview session today. I'm amy,"));
        assert!(spoken.ends_with("Tell me about yourself."));
    }

    #[test]
    fn test_later_questions_get_ack_and_transition() {
        let mut composer = Composer::with_seed(1);
        let spoken = composer.spoken_form(3, "What is a B-tree?", "en-US-amy");
        assert!(spoken.ends_with("What is a B-tree?"));
        assert!(ACKNOWLEDGEMENTS.iter().any(|a| spoken.starts_with(a)));
        assert!(TRANSITIONS.iter().any(|t| spoken.contains(t)));
    }

    #[test]
    fn test_fixed_seed_reproduces_draws() {
        let mut a = Composer::with_seed(42);
        let mut b = Composer::with_seed(42);
        for _ in 0..10 {
            assert_eq!(a.intro_question("English"), b.intro_question("English"));
            assert_eq!(
                a.opener_question("English", "Backend"),
                b.opener_question("English", "Backend")
            );
            assert_eq!(
                a.spoken_form(2, "Q", "en-US-amy"),
                b.spoken_form(2, "Q", "en-US-amy")
            );
        }
    }

    #[test]
    fn test_opener_embeds_position() {
        let mut composer = Composer::with_seed(7);
        let opener = composer.opener_question("English", "Site Reliability Engineering");
        assert!(opener.contains("Site Reliability Engineering"));
    }

    #[test]
    fn test_language_selects_catalog() {
        let mut composer = Composer::with_seed(7);
        let vi = composer.intro_question("Vietnamese");
        assert!(INTRO_QUESTIONS_VI.contains(&vi.as_str()));
        assert_eq!(outro_text("Vietnamese"), OUTRO_VI);
        assert_eq!(outro_text("English"), OUTRO_EN);
        assert_eq!(outro_text("German"), OUTRO_EN); // fallback
    }
}
