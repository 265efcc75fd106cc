use rand::seq::SliceRandom;
use rand::Rng;

/// Combo count between bursts
pub const MILESTONE_EVERY: u32 = 10;

const SYMBOLS: [char; 6] = ['♪', '♫', '♬', '✦', '★', '•'];
const GRAVITY: f64 = 12.0;

/// One spark of a burst
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
}

impl Particle {
    fn spawn(x: f64, y: f64, rng: &mut impl Rng) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-4.0..4.0),
            vel_y: rng.gen_range(-6.0..-2.0),
            symbol: *SYMBOLS.choose(rng).unwrap_or(&'♪'),
            color_index: rng.gen_range(0..6),
            age: 0.0,
            max_age: rng.gen_range(0.8..1.6),
        }
    }

    /// Advances by `dt` seconds; false once the particle has burnt out
    fn update(&mut self, dt: f64) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.vel_y += GRAVITY * dt;
        self.age += dt;
        self.age < self.max_age
    }
}

/// Combo milestone bursts drawn over the session screen
#[derive(Debug, Clone)]
pub struct StageEffects {
    particles: Vec<Particle>,
    width: f64,
    height: f64,
    last_milestone: u32,
    banner: Option<(String, f64)>,
}

impl Default for StageEffects {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl StageEffects {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            particles: Vec::new(),
            width: width as f64,
            height: height as f64,
            last_milestone: 0,
            banner: None,
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width as f64;
        self.height = height as f64;
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn is_active(&self) -> bool {
        !self.particles.is_empty() || self.banner.is_some()
    }

    /// Feeds the live combo; bursts when it crosses a new multiple of ten.
    /// Returns true when a burst was spawned.
    pub fn on_combo(&mut self, combo: u32) -> bool {
        if combo < self.last_milestone {
            self.last_milestone = 0;
        }
        let milestone = combo / MILESTONE_EVERY * MILESTONE_EVERY;
        if milestone == 0 || milestone <= self.last_milestone {
            return false;
        }
        self.last_milestone = milestone;
        self.burst(milestone);
        true
    }

    fn burst(&mut self, milestone: u32) {
        let mut rng = rand::thread_rng();
        let cx = self.width / 2.0;
        let cy = self.height / 3.0;
        let count = 12 + (milestone as usize).min(60) / 2;
        for _ in 0..count {
            let x = cx + rng.gen_range(-8.0..8.0);
            let y = cy + rng.gen_range(-2.0..2.0);
            self.particles.push(Particle::spawn(x, y, &mut rng));
        }
        self.banner = Some((format!("{milestone} COMBO!"), 1.5));
    }

    /// Steps the animation by `dt` seconds, culling spent or off-screen particles
    pub fn update(&mut self, dt: f64) {
        let (width, height) = (self.width, self.height);
        self.particles.retain_mut(|p| {
            let alive = p.update(dt);
            let off_screen = p.y > height + 2.0 || p.x < -2.0 || p.x > width + 2.0;
            alive && !off_screen
        });

        if let Some((_, remaining)) = &mut self.banner {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.banner = None;
            }
        }
    }

    pub fn clear(&mut self) {
        self.particles.clear();
        self.banner = None;
        self.last_milestone = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_on_each_new_milestone() {
        let mut fx = StageEffects::new(80, 24);
        assert!(!fx.on_combo(9));
        assert!(!fx.is_active());

        assert!(fx.on_combo(10));
        assert!(!fx.particles().is_empty());
        assert_eq!(fx.banner(), Some("10 COMBO!"));

        // same milestone again does nothing
        assert!(!fx.on_combo(11));
        assert!(fx.on_combo(20));
        assert_eq!(fx.banner(), Some("20 COMBO!"));
    }

    #[test]
    fn test_combo_drop_rearms_milestones() {
        let mut fx = StageEffects::new(80, 24);
        assert!(fx.on_combo(10));
        fx.clear();
        assert!(!fx.on_combo(0));
        assert!(fx.on_combo(10));
    }

    #[test]
    fn test_particles_fall_and_expire() {
        let mut fx = StageEffects::new(80, 24);
        fx.on_combo(30);
        let before: Vec<f64> = fx.particles().iter().map(|p| p.vel_y).collect();

        fx.update(0.1);
        for (p, v0) in fx.particles().iter().zip(before) {
            assert!(p.vel_y > v0);
        }

        for _ in 0..40 {
            fx.update(0.1);
        }
        assert!(!fx.is_active());
    }

    #[test]
    fn test_off_screen_particles_are_culled() {
        let mut fx = StageEffects::new(20, 10);
        fx.particles.push(Particle {
            x: 100.0,
            y: 100.0,
            vel_x: 0.0,
            vel_y: 0.0,
            symbol: '♪',
            color_index: 0,
            age: 0.0,
            max_age: 10.0,
        });
        fx.update(0.05);
        assert!(fx.particles().is_empty());
    }
}
