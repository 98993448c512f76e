use crate::model::{
    BlockDevice, Instance, InstanceState, InstanceStatus, SecurityGroup, StatusDetail,
};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

pub const SAMPLE_WEB_ID: &str = "i-1234567890abcdef0";
pub const SAMPLE_DATABASE_ID: &str = "i-0987654321fedcba0";
pub const SAMPLE_BACKUP_ID: &str = "i-abcdef1234567890";

/// Standard per-instance metrics reported when no backend is available
pub const INSTANCE_METRIC_NAMES: &[&str] = &[
    "CPUUtilization",
    "DiskReadBytes",
    "DiskReadOps",
    "DiskWriteBytes",
    "DiskWriteOps",
    "NetworkIn",
    "NetworkOut",
    "NetworkPacketsIn",
    "NetworkPacketsOut",
    "StatusCheckFailed",
    "StatusCheckFailed_Instance",
    "StatusCheckFailed_System",
];

const BOOT_LOG: &str = "\
[    0.000000] Linux version 6.1.0-cloud (builder@buildhost) (gcc 12.2.0) #1 SMP
[    0.000000] Command line: BOOT_IMAGE=/boot/vmlinuz root=/dev/nvme0n1p1 ro console=ttyS0
[    0.412733] Memory: 3956544K/4193784K available
[    1.207115] nvme nvme0: 2/0/0 default/read/poll queues
[    2.884012] EXT4-fs (nvme0n1p1): mounted filesystem with ordered data mode
[    4.120551] systemd[1]: Detected virtualization amazon.
[    4.902370] systemd[1]: Reached target Network.
[    6.331904] cloud-init[812]: Cloud-init v. 23.1 running 'modules:config'
[    7.015873] sshd[901]: Server listening on 0.0.0.0 port 22.
[    8.440218] cloud-init[812]: Cloud-init v. 23.1 finished. Datasource DataSourceEc2.
";

/// Fixed multi-line boot log returned as console output
pub fn console_log() -> String {
    BOOT_LOG.to_string()
}

/// The three fixed demo instances: web server, database and backup
pub fn sample_instances() -> Vec<Instance> {
    vec![
        sample(
            SAMPLE_WEB_ID,
            "Web Server",
            "t3.medium",
            InstanceState::Running,
            Some("54.210.12.34"),
            "10.0.1.10",
            "web",
        ),
        sample(
            SAMPLE_DATABASE_ID,
            "Database Server",
            "r5.large",
            InstanceState::Running,
            None,
            "10.0.2.20",
            "database",
        ),
        sample(
            SAMPLE_BACKUP_ID,
            "Backup Server",
            "t3.small",
            InstanceState::Stopped,
            None,
            "10.0.3.30",
            "backup",
        ),
    ]
}

/// Healthy running status for any instance id
pub fn instance_status(instance_id: &str) -> InstanceStatus {
    InstanceStatus {
        instance_id: instance_id.to_string(),
        state: InstanceState::Running,
        system_status: "ok".to_string(),
        instance_status: "ok".to_string(),
        system_status_ok: true,
        instance_status_ok: true,
        details: vec![
            StatusDetail {
                scope: "system".to_string(),
                name: "reachability".to_string(),
                status: "passed".to_string(),
            },
            StatusDetail {
                scope: "instance".to_string(),
                name: "reachability".to_string(),
                status: "passed".to_string(),
            },
        ],
    }
}

fn sample(
    instance_id: &str,
    name: &str,
    instance_type: &str,
    state: InstanceState,
    public_ip: Option<&str>,
    private_ip: &str,
    role: &str,
) -> Instance {
    let mut tags = BTreeMap::new();
    tags.insert("Name".to_string(), name.to_string());
    tags.insert("Role".to_string(), role.to_string());
    tags.insert("Environment".to_string(), "demo".to_string());

    Instance {
        instance_id: instance_id.to_string(),
        name: name.to_string(),
        instance_type: instance_type.to_string(),
        state,
        launch_time: Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).single(),
        public_ip: public_ip.map(str::to_string),
        private_ip: Some(private_ip.to_string()),
        vpc_id: Some("vpc-0a1b2c3d".to_string()),
        subnet_id: Some("subnet-0a1b2c3d".to_string()),
        availability_zone: Some("us-east-1a".to_string()),
        platform: "linux".to_string(),
        architecture: Some("x86_64".to_string()),
        tags,
        security_groups: vec![SecurityGroup {
            group_id: "sg-0a1b2c3d".to_string(),
            group_name: format!("{}-sg", role),
        }],
        block_devices: vec![BlockDevice {
            device_name: "/dev/xvda".to_string(),
            volume_id: Some(format!("vol-{}", &instance_id[2..])),
            delete_on_termination: true,
        }],
        monitoring: false,
        iam_instance_profile: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_instances_shape() {
        let instances = sample_instances();
        let states: Vec<InstanceState> = instances.iter().map(|i| i.state).collect();
        assert_eq!(
            states,
            vec![
                InstanceState::Running,
                InstanceState::Running,
                InstanceState::Stopped
            ]
        );
        assert_eq!(instances, sample_instances());
        assert_eq!(instances[1].instance_id, SAMPLE_DATABASE_ID);
        assert_eq!(instances[0].tags.get("Name").map(String::as_str), Some("Web Server"));
    }

    #[test]
    fn test_console_log_is_multi_line() {
        assert!(console_log().lines().count() > 5);
    }

    #[test]
    fn test_offline_status_is_healthy() {
        let status = instance_status("i-anything");
        assert_eq!(status.state, InstanceState::Running);
        assert!(status.system_status_ok && status.instance_status_ok);
    }
}
