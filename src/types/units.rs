keyword_enum! {
    /// Unit for distances and distance thresholds. Meters when unspecified.
    #[derive(Default)]
    pub enum DistanceUnit {
        #[default]
        Meters => "m",
        Kilometers => "km",
        Miles => "mi",
        Feet => "ft",
        NauticalMiles => "nmi",
    }
}

impl DistanceUnit {
    /// Length of one unit in meters.
    #[must_use]
    pub fn meters(self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.344,
            DistanceUnit::Feet => 0.3048,
            DistanceUnit::NauticalMiles => 1852.0,
        }
    }
}
