//! tls-certificate and certificate-request operations.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use skyway_types::{CertRequestId, CertificateId, CertificateRequest, Lifecycle, TlsCertificate};

use crate::Result;
use crate::entity::{
    access_point, application_network, backbone, certificate_request, interior_site,
    management_controller, member_invitation, member_site, network_credential, tls_certificate,
};

/// insert a tls-certificate row. returns the stored row with its assigned id.
pub async fn insert_tls_certificate<C: ConnectionTrait>(
    conn: &C,
    row: &TlsCertificate,
) -> Result<TlsCertificate> {
    let model: tls_certificate::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    Ok(result.into())
}

/// get a tls certificate by id.
pub async fn get_tls_certificate<C: ConnectionTrait>(
    conn: &C,
    id: CertificateId,
) -> Result<Option<TlsCertificate>> {
    let model = tls_certificate::Entity::find_by_id(id.0).one(conn).await?;
    Ok(model.map(Into::into))
}

/// get a tls certificate by its cluster object name.
pub async fn get_tls_certificate_by_object_name<C: ConnectionTrait>(
    conn: &C,
    object_name: &str,
) -> Result<Option<TlsCertificate>> {
    let model = tls_certificate::Entity::find()
        .filter(tls_certificate::Column::ObjectName.eq(object_name))
        .one(conn)
        .await?;
    Ok(model.map(Into::into))
}

/// list every tls certificate.
pub async fn list_tls_certificates<C: ConnectionTrait>(conn: &C) -> Result<Vec<TlsCertificate>> {
    let models = tls_certificate::Entity::find().all(conn).await?;
    Ok(models.into_iter().map(Into::into).collect())
}

/// refresh a certificate's expiration and renewal times after rotation.
pub async fn refresh_tls_certificate_times<C: ConnectionTrait>(
    conn: &C,
    id: CertificateId,
    expiration: Option<DateTime<Utc>>,
    renewal_time: Option<DateTime<Utc>>,
) -> Result<()> {
    tls_certificate::Entity::update_many()
        .col_expr(tls_certificate::Column::Expiration, Expr::value(expiration))
        .col_expr(
            tls_certificate::Column::RenewalTime,
            Expr::value(renewal_time),
        )
        .filter(tls_certificate::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// delete a tls certificate row.
pub async fn delete_tls_certificate<C: ConnectionTrait>(conn: &C, id: CertificateId) -> Result<()> {
    tls_certificate::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}

/// collect the certificate ids referenced by any managed entity, including
/// the signing links between certificates.
pub async fn list_referenced_certificate_ids<C: ConnectionTrait>(
    conn: &C,
) -> Result<HashSet<i64>> {
    let mut referenced = HashSet::new();

    macro_rules! collect {
        ($entity:ident, $column:ident) => {
            for id in $entity::Entity::find()
                .select_only()
                .column($entity::Column::$column)
                .into_tuple::<Option<i64>>()
                .all(conn)
                .await?
            {
                if let Some(id) = id {
                    referenced.insert(id);
                }
            }
        };
    }

    collect!(management_controller, CertificateId);
    collect!(backbone, CertificateId);
    collect!(interior_site, CertificateId);
    collect!(access_point, CertificateId);
    collect!(application_network, CertificateId);
    collect!(network_credential, CertificateId);
    collect!(member_invitation, CertificateId);
    collect!(member_site, CertificateId);
    // a CA stays referenced while any certificate it signed remains
    collect!(tls_certificate, SignedBy);

    Ok(referenced)
}

/// insert a certificate request. returns the stored row with its assigned id.
pub async fn insert_certificate_request<C: ConnectionTrait>(
    conn: &C,
    row: &CertificateRequest,
) -> Result<CertificateRequest> {
    let model: certificate_request::ActiveModel = row.into();
    let result = model.insert(conn).await?;
    result.try_into()
}

/// get a certificate request by id.
pub async fn get_certificate_request<C: ConnectionTrait>(
    conn: &C,
    id: CertRequestId,
) -> Result<Option<CertificateRequest>> {
    let model = certificate_request::Entity::find_by_id(id.0).one(conn).await?;
    model.map(TryInto::try_into).transpose()
}

/// select the oldest `new` request whose request time has passed.
pub async fn pick_oldest_new_request<C: ConnectionTrait>(
    conn: &C,
) -> Result<Option<CertificateRequest>> {
    let model = certificate_request::Entity::find()
        .filter(certificate_request::Column::Lifecycle.eq(Lifecycle::New.as_str()))
        .filter(certificate_request::Column::RequestTime.lte(Utc::now()))
        .order_by_asc(certificate_request::Column::CreatedAt)
        .one(conn)
        .await?;
    model.map(TryInto::try_into).transpose()
}

/// mark a request's cluster certificate object as created.
pub async fn set_request_cert_created<C: ConnectionTrait>(
    conn: &C,
    id: CertRequestId,
) -> Result<()> {
    certificate_request::Entity::update_many()
        .col_expr(
            certificate_request::Column::Lifecycle,
            Expr::value(Lifecycle::CertObjectCreated.as_str()),
        )
        .filter(certificate_request::Column::Id.eq(id.0))
        .exec(conn)
        .await?;
    Ok(())
}

/// delete a fulfilled certificate request.
pub async fn delete_certificate_request<C: ConnectionTrait>(
    conn: &C,
    id: CertRequestId,
) -> Result<()> {
    certificate_request::Entity::delete_by_id(id.0).exec(conn).await?;
    Ok(())
}
