//! Prompt context built from retrieved records.

use crate::retrieval::RetrievedRecord;

/// Join record texts with a blank line between them, closest record first.
pub fn format_context(records: &[RetrievedRecord]) -> String {
    records
        .iter()
        .map(|r| r.record.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One line per record for terminal display.
pub fn format_sources_for_display(records: &[RetrievedRecord]) -> String {
    records
        .iter()
        .map(|r| {
            let label = r
                .record
                .label
                .as_ref()
                .map(|l| format!(" [{}]", l))
                .unwrap_or_default();
            format!(
                "#{} {}{} (distance: {:.3})",
                r.record.seq_num, r.record.source, label, r.distance
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Record;

    fn hit(seq_num: usize, label: Option<&str>, text: &str, distance: f32) -> RetrievedRecord {
        RetrievedRecord {
            record: Record {
                seq_num,
                source: "meals.json".to_string(),
                label: label.map(str::to_string),
                text: text.to_string(),
            },
            distance,
        }
    }

    #[test]
    fn test_format_context() {
        let records = vec![
            hit(3, None, "{'name': 'Squat'}", 0.2),
            hit(0, None, "{'name': 'Push-up'}", 0.9),
        ];
        assert_eq!(
            format_context(&records),
            "{'name': 'Squat'}\n\n{'name': 'Push-up'}"
        );
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_format_sources_for_display() {
        let records = vec![hit(1, Some("breakfast"), "{'food': 'Oats'}", 0.25)];
        assert_eq!(
            format_sources_for_display(&records),
            "#1 meals.json [breakfast] (distance: 0.250)"
        );
    }
}
