use crate::model::{AlertSeverity, AlertStatus};

/// CPU utilization percentage at which an instance is considered alerting
pub const DEFAULT_CPU_THRESHOLD: f64 = 80.0;

/// Readings at or above this percentage are always high severity
const HIGH_SEVERITY_FLOOR: f64 = 90.0;

/// Fraction of the threshold where the low-severity band starts
const ELEVATED_FRACTION: f64 = 0.7;

/// Classify a CPU utilization reading against a threshold
///
/// Bands are inclusive at their lower edge. With the default threshold of 80:
/// below 56 is normal, 56 up to 80 is low, 80 up to 90 is medium and 90 or
/// more is high.
pub fn classify_alert(value: f64, threshold: f64) -> AlertStatus {
    if value >= threshold {
        let severity = if value >= HIGH_SEVERITY_FLOOR {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        AlertStatus {
            alert: true,
            severity,
            message: format!("High CPU usage: {:.1}%", value),
        }
    } else if value >= threshold * ELEVATED_FRACTION {
        AlertStatus {
            alert: true,
            severity: AlertSeverity::Low,
            message: format!("Elevated CPU usage: {:.1}%", value),
        }
    } else {
        AlertStatus {
            alert: false,
            severity: AlertSeverity::None,
            message: format!("Normal CPU usage: {:.1}%", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn severity(value: f64) -> AlertSeverity {
        classify_alert(value, DEFAULT_CPU_THRESHOLD).severity
    }

    #[test]
    fn test_bands() {
        assert_eq!(severity(0.0), AlertSeverity::None);
        assert_eq!(severity(55.9), AlertSeverity::None);
        assert_eq!(severity(60.0), AlertSeverity::Low);
        assert_eq!(severity(79.99), AlertSeverity::Low);
        assert_eq!(severity(85.0), AlertSeverity::Medium);
        assert_eq!(severity(89.99), AlertSeverity::Medium);
        assert_eq!(severity(95.0), AlertSeverity::High);
        assert_eq!(severity(100.0), AlertSeverity::High);
    }

    #[test]
    fn test_boundaries_are_inclusive_high() {
        let low = classify_alert(56.0, DEFAULT_CPU_THRESHOLD);
        assert!(low.alert);
        assert_eq!(low.severity, AlertSeverity::Low);

        let medium = classify_alert(80.0, DEFAULT_CPU_THRESHOLD);
        assert!(medium.alert);
        assert_eq!(medium.severity, AlertSeverity::Medium);

        let high = classify_alert(90.0, DEFAULT_CPU_THRESHOLD);
        assert!(high.alert);
        assert_eq!(high.severity, AlertSeverity::High);
    }

    #[test]
    fn test_messages_use_one_decimal() {
        assert_eq!(
            classify_alert(91.234, DEFAULT_CPU_THRESHOLD).message,
            "High CPU usage: 91.2%"
        );
        assert_eq!(
            classify_alert(60.05, DEFAULT_CPU_THRESHOLD).message,
            "Elevated CPU usage: 60.0%"
        );
        assert_eq!(
            classify_alert(12.0, DEFAULT_CPU_THRESHOLD).message,
            "Normal CPU usage: 12.0%"
        );
    }

    #[test]
    fn test_custom_threshold() {
        // 50 * 0.7 = 35
        assert_eq!(classify_alert(34.0, 50.0).severity, AlertSeverity::None);
        assert_eq!(classify_alert(35.0, 50.0).severity, AlertSeverity::Low);
        assert_eq!(classify_alert(50.0, 50.0).severity, AlertSeverity::Medium);
    }
}
