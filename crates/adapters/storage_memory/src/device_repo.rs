//! In-memory implementation of [`DeviceRepository`].

use std::future::Future;

use entigate_app::ports::DeviceRepository;
use entigate_domain::device::Device;
use entigate_domain::error::GatewayError;
use entigate_domain::id::DeviceId;

use crate::{MemoryStorage, read, write};

impl DeviceRepository for MemoryStorage {
    fn save_device(
        &self,
        device: Device,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        write(&self.devices).insert(device.id.clone(), device);
        async { Ok(()) }
    }

    fn load_devices(&self) -> impl Future<Output = Result<Vec<Device>, GatewayError>> + Send {
        let devices: Vec<Device> = read(&self.devices).values().cloned().collect();
        async { Ok(devices) }
    }

    fn delete_device(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send {
        write(&self.devices).remove(&id);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> Device {
        Device::builder().id(id).plugin_id("hue").build().unwrap()
    }

    #[tokio::test]
    async fn should_load_saved_devices_ordered_by_id() {
        let storage = MemoryStorage::new();
        storage.save_device(device("b")).await.unwrap();
        storage.save_device(device("a")).await.unwrap();

        let ids: Vec<String> = storage
            .load_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn should_replace_device_on_save() {
        let storage = MemoryStorage::new();
        storage.save_device(device("a")).await.unwrap();

        let mut renamed = device("a");
        renamed.local_name = "Porch".to_string();
        storage.save_device(renamed).await.unwrap();

        let devices = storage.load_devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name(), "Porch");
    }

    #[tokio::test]
    async fn should_delete_device() {
        let storage = MemoryStorage::new();
        storage.save_device(device("a")).await.unwrap();
        storage.delete_device(DeviceId::from("a")).await.unwrap();
        storage.delete_device(DeviceId::from("missing")).await.unwrap();

        assert!(storage.load_devices().await.unwrap().is_empty());
    }
}
