//! Pre-written fallback comments used when live generation fails.
//!
//! Selection is deduplicated per run through a [`FallbackRegistry`] owned by
//! the reaction engine: a text is not handed out twice until every text of
//! that mode's pool has been used once.

use std::collections::HashSet;

use rand::prelude::IndexedRandom;
use rand::Rng;
use vsim_models::SimulationMode;

/// Constructive comments for `standard` mode.
pub const SUPPORTIVE_COMMENTS: &[&str] = &[
    "I really appreciate how you focused on the lighting setup here. The way the rim light separates the subject from the background is subtle but adds so much production value. It's those small details that make the difference.",
    "This is a great breakdown, but I think you could have spent a bit more time explaining the 'why' behind step 3. It's the most complex part and felt a bit rushed visually, though the end result is undeniable.",
    "The pacing here is spot on. I love that you let the shot linger on the final result so we could actually appreciate the texture. Most creators cut away too fast, but you gave the visuals room to breathe.",
    "Interesting choice to use a wide angle for the close-ups. It gives it a very dynamic feel, though the edges look a bit distorted. Have you considered an 85mm for those shots to flatten the perspective slightly?",
    "Super helpful tip about the workflow! I've been struggling with that specific bottleneck for months. Seeing you execute it in real-time clarified so much for me. I'm definitely subscribing for more deep dives like this.",
    "The sound design adds so much immersion here. The subtle foley work when you pick up the items makes it feel very tactile. It's something a lot of people overlook, but you nailed it.",
    "I love the color palette you went with. The teal and orange look is popular for a reason, but you managed to keep the skin tones looking natural, which is really hard to pull off.",
    "Your delivery is incredibly clear and concise. You cut out all the fluff and got straight to the value, which I respect. Too many videos drag on for 10 minutes for a 2-minute point.",
    "The use of b-roll here is excellent. It perfectly illustrates the concepts you're talking about without being distracting. Where do you source your stock footage, or did you shoot it all yourself?",
    "I was skeptical when I saw the thumbnail, but the depth of analysis here is surprising. You actually understand the underlying mechanics rather than just repeating what everyone else says.",
    "The typography you used for the chapter titles is so clean. It integrates perfectly with the environment tracking. How long did it take to motion track those labels?",
    "I've watched three other tutorials on this topic, but this is the first one that actually showed the mistake recovery process. Seeing how you fixed the error was more valuable than the perfect run.",
    "The audio mixing balance is perfect. Usually, the background music overpowers the voiceover in these types of videos, but you found the perfect pocket for the dialogue.",
    "That transition at 0:45 where you matched the movement of the camera to the object was seamless. It kept the energy flowing perfectly into the next segment.",
    "I appreciate that you didn't oversaturate the final image. A lot of people crank the vibrance way too high, but this looks cinematic and grounded in reality.",
    "The narrative arc you built into this review was unexpected. Starting with the conclusion and then working backwards really hooked me from the first frame.",
    "Can we talk about the set design? The depth of field you achieved really highlights the subject, but the background elements are interesting enough to add character without being distracting.",
    "The practical effects were a nice touch. CGI would have looked cheaper, but building the actual model gives it a tangible weight that translates well on screen.",
    "Your explanation of the theory behind this technique was excellent. It's rare to find content that balances high-level concepts with practical application so well.",
    "The 60fps frame rate really shines here during the fast-motion segments. It keeps the action readable where 24fps would have turned into a blur.",
];

/// Critical comments for `troll` mode.
pub const ADVERSARIAL_COMMENTS: &[&str] = &[
    "I'm looking at the lighting in the intro and honestly, it's washing out all the detail. You need to diffuse that key light better because right now it looks amateur.",
    "I'm struggling to see the point of the edit at the 10-second mark. It cuts away way too fast before we can actually see the product details. It feels like you're hiding imperfections.",
    "The audio mixing is all over the place here. The background track completely overpowers the voiceover during the demo section. You need to sidechain that compression.",
    "Honestly, the color grading looks completely unnatural. The saturation on the greens is blown out, making it look radioactive rather than vibrant. Dial it back.",
    "This technique is technically incorrect. You're holding the tool wrong, which sets a dangerous example for beginners who might actually try this. Please do better research.",
    "Why is the pacing so frantic? I can't even process what's happening on screen because of the jump cuts every two seconds. It gives me a headache instead of information.",
    "The typography choice for the lower thirds is barely readable against that background. You need a drop shadow or a semi-transparent box behind the text if you want people to actually read it.",
    "Is the camera focus hunting in the second clip? It looks like you left autofocus on and it keeps pulsing. Very distracting for a 'professional' tutorial.",
    "The transition effects are incredibly dated. The star wipe and the slide-in animation scream 'Windows Movie Maker 2005'. Keep it simple with hard cuts or dissolves.",
    "I don't think you actually verified these facts. The statistics you mentioned at the start are from a study that was debunked three years ago. Do better due diligence.",
    "The narrative structure here is completely backwards. You gave away the reveal in the first 5 seconds, ruining the retention curve. Basic storytelling 101.",
    "Please stop using this shaky-cam handheld style for static product shots. Buy a cheap tripod. It's making the video unwatchable and nauseating.",
    "The background clutter is incredibly distracting. I spent half the video trying to figure out what that mess on the shelf was instead of listening to you. Clean your set.",
    "Your audio levels are clipping red constantly. It's distorted and painful to listen to on headphones. Learn to use a limiter properly.",
    "Using a 24fps timeline for a gaming tutorial is a terrible choice. The motion blur destroys all the gameplay detail. This needs to be 60fps minimum.",
    "This feels overly scripted and robotic. You're clearly reading off a teleprompter and your eyes aren't even looking at the lens. It feels completely inauthentic.",
    "The text overlay obscures the actual action you're trying to demonstrate. Why would you put a giant subscribe button right over the focal point?",
    "Your white balance is shifting between cuts. One shot is warm, the next is cool. It looks like you left it on auto. Consistency is key for professional work.",
    "The 'humorous' skits in the middle add nothing and just pad the runtime. This could have been a 30-second short, but you dragged it out for ad revenue.",
    "I checked the timestamp, and you spent 4 minutes on the intro before actually starting the tutorial. That is disrespectful to the viewer's time.",
    "The resolution on the B-roll looks like 720p upscaled. If you're going to review 4K gear, you need to upload in 4K. It defeats the purpose.",
    "You completely skipped over the most important step in the process. You went from step A to C and assumed we'd figure out B. Not helpful for beginners.",
    "The music choice is totally inappropriate for the mood of the video. It's way too upbeat for a serious analysis video and creates a weird tonal clash.",
    "Why are you shouting? The gain on your microphone is fine, you don't need to project like you're in a crowded stadium. It's exhausting to listen to.",
];

/// Fallback texts already handed out in the current run.
#[derive(Debug, Default, Clone)]
pub struct FallbackRegistry {
    used: HashSet<String>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh dedup window.
    pub fn reset(&mut self) {
        self.used.clear();
    }

    pub fn contains(&self, text: &str) -> bool {
        self.used.contains(text)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    fn record(&mut self, text: &str) {
        self.used.insert(text.to_string());
    }
}

/// Selector over the two static pools.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackPool;

impl FallbackPool {
    /// The pool eligible for `mode`.
    pub fn texts(mode: SimulationMode) -> &'static [&'static str] {
        match mode {
            SimulationMode::Standard => SUPPORTIVE_COMMENTS,
            SimulationMode::Troll => ADVERSARIAL_COMMENTS,
        }
    }

    /// Pick a text for `mode` not yet in `registry`, and record it.
    ///
    /// Once every text of the pool has been used, picks from the whole pool.
    pub fn pick(mode: SimulationMode, registry: &mut FallbackRegistry) -> String {
        Self::pick_with(mode, registry, &mut rand::rng())
    }

    /// [`FallbackPool::pick`] with a caller-provided RNG.
    pub fn pick_with<R: Rng + ?Sized>(
        mode: SimulationMode,
        registry: &mut FallbackRegistry,
        rng: &mut R,
    ) -> String {
        let pool = Self::texts(mode);
        let available: Vec<&str> = pool
            .iter()
            .copied()
            .filter(|text| !registry.contains(text))
            .collect();

        let candidates: &[&str] = if available.is_empty() { pool } else { &available };

        // both pools are non-empty constants
        let selected = candidates.choose(rng).copied().unwrap_or(pool[0]);
        registry.record(selected);
        selected.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pools_are_disjoint_and_unique() {
        let supportive: HashSet<_> = SUPPORTIVE_COMMENTS.iter().collect();
        let adversarial: HashSet<_> = ADVERSARIAL_COMMENTS.iter().collect();
        assert_eq!(supportive.len(), SUPPORTIVE_COMMENTS.len());
        assert_eq!(adversarial.len(), ADVERSARIAL_COMMENTS.len());
        assert!(supportive.is_disjoint(&adversarial));
    }

    #[test]
    fn test_no_repeat_until_pool_exhausted() {
        let mut rng = StdRng::seed_from_u64(7);
        for mode in [SimulationMode::Standard, SimulationMode::Troll] {
            let mut registry = FallbackRegistry::new();
            let pool_len = FallbackPool::texts(mode).len();

            let picks: Vec<String> = (0..pool_len)
                .map(|_| FallbackPool::pick_with(mode, &mut registry, &mut rng))
                .collect();
            let distinct: HashSet<_> = picks.iter().collect();
            assert_eq!(distinct.len(), pool_len, "repeat before exhaustion in {mode}");

            // exhausted: still answers, from the same pool
            let extra = FallbackPool::pick_with(mode, &mut registry, &mut rng);
            assert!(FallbackPool::texts(mode).contains(&extra.as_str()));
            assert_eq!(registry.len(), pool_len);
        }
    }

    #[test]
    fn test_mode_selects_pool() {
        let mut registry = FallbackRegistry::new();
        let text = FallbackPool::pick(SimulationMode::Troll, &mut registry);
        assert!(ADVERSARIAL_COMMENTS.contains(&text.as_str()));
        let text = FallbackPool::pick(SimulationMode::Standard, &mut registry);
        assert!(SUPPORTIVE_COMMENTS.contains(&text.as_str()));
    }

    #[test]
    fn test_reset_reopens_used_texts() {
        let mut registry = FallbackRegistry::new();
        for _ in 0..SUPPORTIVE_COMMENTS.len() - 1 {
            FallbackPool::pick(SimulationMode::Standard, &mut registry);
        }
        // exactly one unused text is left and it must be chosen
        let last_unused = SUPPORTIVE_COMMENTS
            .iter()
            .find(|t| !registry.contains(t))
            .unwrap()
            .to_string();
        assert_eq!(FallbackPool::pick(SimulationMode::Standard, &mut registry), last_unused);

        registry.reset();
        assert!(registry.is_empty());
        assert!(!registry.contains(&last_unused));
    }
}
