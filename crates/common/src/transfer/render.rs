use crate::swarm::TransferStatus;

const KILO: f64 = 1_000.0;
const MEGA: f64 = 1_000_000.0;

/// One status line for a handle:
///
/// `<label> <progress>%, Peers: <n>, Download: <r> kB/s, Upload: <r> kB/s,
///  Total Downloaded: <m> MB, Total Uploaded: <m> MB`
pub fn render_status(label: &str, status: &TransferStatus) -> String {
    format!(
        "{} {:.2}%, Peers: {}, Download: {:.2} kB/s, Upload: {:.2} kB/s, Total Downloaded: {:.2} MB, Total Uploaded: {:.2} MB",
        label,
        status.progress as f64 * 100.0,
        status.peers,
        status.download_rate as f64 / KILO,
        status.upload_rate as f64 / KILO,
        status.total_downloaded as f64 / MEGA,
        status.total_uploaded as f64 / MEGA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_status() {
        let status = TransferStatus {
            progress: 0.5,
            peers: 3,
            download_rate: 1_500,
            upload_rate: 250,
            total_downloaded: 2_500_000,
            total_uploaded: 0,
            is_seeding: false,
            is_valid: true,
        };
        assert_eq!(
            render_status("Downloading a.txt", &status),
            "Downloading a.txt 50.00%, Peers: 3, Download: 1.50 kB/s, Upload: 0.25 kB/s, \
             Total Downloaded: 2.50 MB, Total Uploaded: 0.00 MB"
        );
    }
}
