//! Image handlers.

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use edge_api_types::{
    CreateImageRequest, ImageList, ImageResponse, InstallerBody, RepositoryBody,
    UpdateImageRequest, UpgradeImageRequest, UserBody,
};

use crate::application::error::AppError;
use crate::application::images::{CreateImageCommand, UpdateImageCommand, UpgradeImageCommand};
use crate::domain::account::Account;
use crate::domain::image::{Image, RepoRecord};

use super::HttpState;

pub async fn create_image(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
    Json(payload): Json<CreateImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let command = create_command(payload)?;
    let image = state.images.create(&account, command).await?;
    Ok((StatusCode::CREATED, Json(image_response(&image))))
}

pub async fn list_images(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
) -> Result<impl IntoResponse, AppError> {
    let images = state.images.list(&account).await?;
    let items: Vec<ImageResponse> = images.iter().map(image_response).collect();
    Ok(Json(ImageList {
        count: items.len(),
        items,
    }))
}

pub async fn get_image(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let image = state.images.get(&account, &id).await?;
    Ok(Json(image_response(&image)))
}

pub async fn update_image(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let command = UpdateImageCommand {
        uuid: id,
        name: payload.name,
        description: payload.description,
        tags_to_add: payload.tags.add,
        tags_to_remove: payload.tags.remove,
    };
    state.images.update(&account, command).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_image(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.images.delete(&account, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upgrade_image(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
    Json(payload): Json<UpgradeImageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let command = UpgradeImageCommand {
        uuid: id,
        name: payload.name,
        description: payload.description,
        tags_to_add: payload.tags.add,
        tags_to_remove: payload.tags.remove,
        packages_to_add: payload.packages.add,
        packages_to_remove: payload.packages.remove,
    };
    state.images.upgrade(&account, command).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn cancel_upgrade(
    State(state): State<HttpState>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.images.cancel_upgrade(&account, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn create_command(payload: CreateImageRequest) -> Result<CreateImageCommand, AppError> {
    let CreateImageRequest {
        name,
        description,
        distribution,
        username,
        ssh_key,
        output_type,
        packages,
        tags,
        repositories,
    } = payload;

    Ok(CreateImageCommand {
        name: required(name, "name", "provide a name for the image")?,
        description: required(
            description,
            "description",
            "provide a description for the image",
        )?,
        distribution: required(
            distribution,
            "distribution",
            "provide a distribution such as rhel-85",
        )?,
        username: required(username, "username", "provide a username for the image user")?,
        ssh_key: required(ssh_key, "sshKey", "provide an ssh public key for the image user")?,
        output_types: output_type,
        tags,
        packages,
        repos: repositories
            .into_iter()
            .map(|repo| RepoRecord::new(repo.name, repo.url))
            .collect(),
    })
}

fn required(
    value: Option<String>,
    field: &'static str,
    hint: &'static str,
) -> Result<String, AppError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::validation(format!("{field} is required"), hint)),
    }
}

fn image_response(image: &Image) -> ImageResponse {
    let timing = image.timing();
    let installer = image.installer();
    ImageResponse {
        uuid: image.uuid().to_string(),
        name: image.name().as_str().to_string(),
        description: image.description().to_string(),
        distribution: image.distribution().as_str().to_string(),
        status: image.status().as_str().to_string(),
        version: image.version().get(),
        user: UserBody {
            username: image.user().username().to_string(),
            ssh_key: image.user().ssh_key().to_string(),
        },
        output_type: image.output_types().to_strings(),
        packages: image.packages().to_vec(),
        tags: image.tags().to_vec(),
        repositories: image
            .repos()
            .iter()
            .map(|repo| RepositoryBody {
                name: repo.name().to_string(),
                url: repo.url().to_string(),
            })
            .collect(),
        installer: (!installer.is_zero()).then(|| InstallerBody {
            iso_url: installer.iso_url().to_string(),
            compose_job_id: installer.compose_job_id().to_string(),
            checksum: installer.checksum().to_string(),
        }),
        created_at: timing.created_at,
        updated_at: timing.updated_at,
        deleted_at: timing.deleted_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_request() -> CreateImageRequest {
        CreateImageRequest {
            name: Some("edge1".into()),
            description: Some("kiosk image".into()),
            distribution: Some("rhel-85".into()),
            username: Some("root".into()),
            ssh_key: Some("ssh-ed25519 AAAA".into()),
            output_type: vec!["rhel-edge-installer".into()],
            ..Default::default()
        }
    }

    #[test]
    fn complete_request_maps_to_command() {
        let mut request = complete_request();
        request.repositories = vec![RepositoryBody {
            name: "extras".into(),
            url: "https://repo.example.com/extras".into(),
        }];

        let command = create_command(request).expect("valid command");
        assert_eq!(command.name, "edge1");
        assert_eq!(command.ssh_key, "ssh-ed25519 AAAA");
        assert_eq!(
            command.repos,
            vec![RepoRecord::new("extras", "https://repo.example.com/extras")]
        );
    }

    #[test]
    fn missing_required_field_is_a_hinted_validation_error() {
        let mut request = complete_request();
        request.ssh_key = None;

        let err = create_command(request).expect_err("missing ssh key");
        match err {
            AppError::Validation { message, hint } => {
                assert_eq!(message, "sshKey is required");
                assert!(hint.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let mut request = complete_request();
        request.name = Some("   ".into());
        assert!(create_command(request).is_err());
    }
}
