bitflags::bitflags! {
    /// Render state that changed since the last tick.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Dirty: u8 {
        /// Pan, zoom or project size moved the canvas on screen.
        const TRANSFORM = 0b0000_0001;
        /// Layer set, layer pixels or modifiers changed; the composite is stale.
        const LAYERS    = 0b0000_0010;
        const PREVIEW   = 0b0000_0100;
        /// Selection mask changed or the marching ants advanced.
        const SELECTION = 0b0000_1000;
        const RESIZE    = 0b0001_0000;
    }
}

impl Default for Dirty {
    /// A fresh engine has nothing cached, so everything starts dirty.
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_independent() {
        let mut d = Dirty::empty();
        d |= Dirty::PREVIEW;
        d |= Dirty::SELECTION;
        assert!(d.contains(Dirty::PREVIEW));
        assert!(!d.intersects(Dirty::LAYERS | Dirty::TRANSFORM));
        d.remove(Dirty::PREVIEW);
        assert_eq!(d, Dirty::SELECTION);
        assert_eq!(Dirty::default(), Dirty::all());
    }
}
