use crate::draw::model::Color;
use crate::draw::surface::Surface;
use crate::schedule::{Scheduler, TaskHandle};
use std::fmt::Debug;

pub const DEFAULT_FADE_WASH_ALPHA: u8 = 5;

/// Washes the surface towards white on every animation frame while a brush
/// gesture is active with fading enabled.
#[derive(Debug, Clone)]
pub struct FadeDecay {
    handle: Option<TaskHandle>,
    wash: Color,
}

impl Default for FadeDecay {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_WASH_ALPHA)
    }
}

impl FadeDecay {
    pub fn new(wash_alpha: u8) -> Self {
        Self {
            handle: None,
            wash: Color::WHITE.with_alpha(wash_alpha),
        }
    }

    pub fn wash_color(&self) -> Color {
        self.wash
    }

    /// Schedules the recurring tick unless one is already scheduled.
    pub fn start<K: Copy + Debug>(&mut self, scheduler: &mut Scheduler<K>, kind: K) -> bool {
        if self.is_running(scheduler) {
            return false;
        }
        self.handle = Some(scheduler.schedule_animation_frame(kind));
        tracing::debug!("fade decay started");
        true
    }

    pub fn stop<K: Copy + Debug>(&mut self, scheduler: &mut Scheduler<K>) {
        if let Some(handle) = self.handle.take() {
            if scheduler.cancel(handle) {
                tracing::debug!("fade decay stopped");
            }
        }
    }

    pub fn is_running<K: Copy + Debug>(&self, scheduler: &Scheduler<K>) -> bool {
        self.handle
            .is_some_and(|handle| scheduler.is_scheduled(handle))
    }

    /// One animation-frame tick. Cancels its own recurrence as soon as fading
    /// is off or no gesture is active; returns whether a wash was applied.
    pub fn tick<K: Copy + Debug>(
        &mut self,
        scheduler: &mut Scheduler<K>,
        surface: &mut Surface,
        fading_enabled: bool,
        gesture_active: bool,
    ) -> bool {
        if !fading_enabled || !gesture_active {
            self.stop(scheduler);
            return false;
        }
        let wash = self.wash;
        surface.edit(|buffer| buffer.wash(wash));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::FadeDecay;
    use crate::draw::model::Color;
    use crate::draw::surface::Surface;
    use crate::schedule::Scheduler;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Fade;

    #[test]
    fn start_is_idempotent_and_stop_is_safe_twice() {
        let mut scheduler = Scheduler::new();
        let mut fade = FadeDecay::default();

        assert!(fade.start(&mut scheduler, Fade));
        assert!(!fade.start(&mut scheduler, Fade));
        assert_eq!(scheduler.len(), 1);

        fade.stop(&mut scheduler);
        fade.stop(&mut scheduler);
        assert!(scheduler.is_empty());
        assert!(!fade.is_running(&scheduler));
    }

    #[test]
    fn tick_washes_towards_white() {
        let mut scheduler = Scheduler::new();
        let mut fade = FadeDecay::new(5);
        let mut surface = Surface::new(2, 2, Color::BLACK);
        fade.start(&mut scheduler, Fade);

        assert!(fade.tick(&mut scheduler, &mut surface, true, true));
        let pixel = surface.buffer().pixel(0, 0);
        assert!(pixel.r > 0 && pixel.r < 10);
        assert_eq!(pixel.a, 255);
    }

    #[test]
    fn tick_self_terminates_when_fading_or_gesture_ends() {
        let mut scheduler = Scheduler::new();
        let mut fade = FadeDecay::default();
        let mut surface = Surface::new(2, 2, Color::BLACK);

        fade.start(&mut scheduler, Fade);
        assert!(!fade.tick(&mut scheduler, &mut surface, false, true));
        assert!(!fade.is_running(&scheduler));

        fade.start(&mut scheduler, Fade);
        assert!(!fade.tick(&mut scheduler, &mut surface, true, false));
        assert!(scheduler.is_empty());
        assert!(surface.buffer().is_uniform(Color::BLACK));
    }
}
